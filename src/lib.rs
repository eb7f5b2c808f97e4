//! Procedural cave tunnel generation
//!
//! Carves a network of tunnels through the rock cells of a 2D map and
//! produces per-cell tunnel width (plus optional depth and lateral offset)
//! for the terrain code that turns it into passable ground.
//!
//! ```no_run
//! use cave_tunnels::{CaveGenerator, CaveParams, Tilemap};
//!
//! let mask = Tilemap::from_fn(200, 200, |x, z| (20..180).contains(&x) && (20..180).contains(&z));
//! let mut generator = CaveGenerator::new(CaveParams::default()).unwrap();
//! let network = generator.generate(&mask, 42, None);
//! println!("{} cells carved", network.grids.carved_count());
//! ```

pub mod digger;
pub mod error;
pub mod export;
pub mod generator;
pub mod grids;
pub mod mask;
pub mod noise_field;
pub mod params;
pub mod planner;
pub mod radial;
pub mod rock_groups;
pub mod seeds;
pub mod tilemap;
pub mod validator;

pub use error::CaveError;
pub use generator::{CaveGenerator, CaveNetwork};
pub use grids::CaveGrids;
pub use params::CaveParams;
pub use tilemap::{Cell, Tilemap};
pub use validator::{BoundaryContext, GenerationReport, MapSide, SidePassability};
