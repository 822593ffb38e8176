//! Render an image as a field of particles that scatter away from the pointer and spring back
//! to where they came from.
//!
//! The simulation itself (sampling, physics and drawing onto a [`canvas::Canvas`]) knows nothing
//! about terminals. The terminal is just one place to show the canvas.

pub mod animation;
pub mod canvas;
pub mod cli_args;
pub mod colour;
pub mod config;
pub mod errors;
mod input;
pub mod particle;
pub mod pointer;
pub mod renderer;
pub mod run;
pub mod sampler;
mod scene;
pub mod shared_state;
pub mod simulation;
pub mod source;
mod surface;
mod terminal;
