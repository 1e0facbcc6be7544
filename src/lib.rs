//! Formula rendering service: TeX, MathML and AsciiMath to HTML, SVG, PNG or
//! MathML, with optional object-storage persistence for rasters.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
