//! Format converters
//!
//! This module contains converters between music notation formats.

pub mod musicxml;
