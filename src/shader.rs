use std::fs::read_to_string;
use std::path::Path;

use anyhow::{Context, Result};
use gfx_hal::pso;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn glsl_type(self) -> glsl_to_spirv::ShaderType {
        match self {
            Stage::Vertex => glsl_to_spirv::ShaderType::Vertex,
            Stage::Fragment => glsl_to_spirv::ShaderType::Fragment,
        }
    }
}

/// Reads a GLSL file and compiles it to SPIR-V words.
pub fn load(path: impl AsRef<Path>, stage: Stage) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let code = read_to_string(path)
        .with_context(|| format!("can't read shader {}", path.display()))?;
    let spirv = compile(&code, stage)
        .with_context(|| format!("can't compile shader {}", path.display()))?;
    log::debug!(
        "compiled {:?} shader {} ({} words)",
        stage,
        path.display(),
        spirv.len()
    );
    Ok(spirv)
}

pub fn compile(code: &str, stage: Stage) -> Result<Vec<u32>> {
    let file = glsl_to_spirv::compile(code, stage.glsl_type()).map_err(anyhow::Error::msg)?;
    let spirv = pso::read_spirv(file).context("glslang produced invalid SPIR-V")?;
    Ok(spirv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FRAGMENT_SHADER_PATH, VERTEX_SHADER_PATH};

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn shipped(path: &str) -> String {
        // resolved against the manifest so the working directory does not matter
        format!("{}/{}", env!("CARGO_MANIFEST_DIR"), path)
    }

    #[test]
    fn shipped_shaders_compile() {
        let vs = load(shipped(VERTEX_SHADER_PATH), Stage::Vertex).unwrap();
        let fs = load(shipped(FRAGMENT_SHADER_PATH), Stage::Fragment).unwrap();
        assert_eq!(vs[0], SPIRV_MAGIC);
        assert_eq!(fs[0], SPIRV_MAGIC);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load("./shader/does_not_exist.glsl", Stage::Vertex).unwrap_err();
        assert!(err.to_string().contains("does_not_exist.glsl"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let res = compile("#version 450\nvoid main() { oops }\n", Stage::Fragment);
        assert!(res.is_err());
    }
}
