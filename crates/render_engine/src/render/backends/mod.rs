//! Graphics backend implementations

pub mod opengl;

pub use opengl::OpenGlBackend;
