//! Persisted State Store (§4.3): the parameter file and the VCL file, the
//! only durable state this gateway keeps.

pub mod params;
pub mod vcl;

pub use params::ParamList;
