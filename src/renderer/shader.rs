// SPIR-V loading
//
// Shaders are compiled ahead of time (see build.rs) and read from disk at
// startup. Word alignment and endianness are handled by `ash::util::read_spv`.

use std::fs::File;
use std::path::Path;

use crate::error::{RendererError, RendererResult};

/// Read a SPIR-V binary into 32-bit words
pub fn load_spirv(path: impl AsRef<Path>) -> RendererResult<Vec<u32>> {
    let path = path.as_ref();
    let shader_load_failed = |source| RendererError::ShaderLoadFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(shader_load_failed)?;
    let words = ash::util::read_spv(&mut file).map_err(shader_load_failed)?;

    log::debug!("Loaded {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Vertex and fragment stage code for the pipeline
#[derive(Debug, Clone, Default)]
pub struct ShaderSet {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSet {
    pub fn new(vertex: Vec<u32>, fragment: Vec<u32>) -> Self {
        Self { vertex, fragment }
    }

    pub fn load(
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
    ) -> RendererResult<Self> {
        Ok(Self {
            vertex: load_spirv(vertex_path)?,
            fragment: load_spirv(fragment_path)?,
        })
    }
}
