// Shader module loading
//
// Vulkan consumes SPIR-V words. The bytes come from compiled files on disk
// and are treated as an opaque payload apart from the word decoding.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::error::{InitError, InitResult};

/// Read a whole file. This is the only place shader files are opened.
pub fn read_binary(path: &Path) -> InitResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| InitError::ShaderFileUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode SPIR-V bytes into words, fixing endianness from the magic number.
pub fn decode_spirv(path: &Path, bytes: &[u8]) -> InitResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| {
        InitError::InvalidShaderBytecode {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read and decode a compiled shader.
pub fn load_spirv(path: &Path) -> InitResult<Vec<u32>> {
    let bytes = read_binary(path)?;
    let words = decode_spirv(path, &bytes)?;
    log::debug!("Loaded shader {:?} ({} words)", path, words.len());
    Ok(words)
}

pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> InitResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(InitError::ShaderModuleCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let file_name = format!("vk-bootstrap-{}-{}", std::process::id(), name);
        let path = std::env::temp_dir().join(file_name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_is_unreadable() {
        let path = Path::new("definitely/not/here/vert.spv");

        match read_binary(path) {
            Err(InitError::ShaderFileUnreadable { path: reported, .. }) => {
                assert_eq!(reported, path);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reads_bytes_verbatim() {
        let path = temp_file("verbatim.spv", &[1, 2, 3, 4, 5]);

        assert_eq!(read_binary(&path).unwrap(), vec![1, 2, 3, 4, 5]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn decodes_little_endian_words() {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 0x0001_0000, 7] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        let words = decode_spirv(Path::new("inline"), &bytes).unwrap();

        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 7]);
    }

    #[test]
    fn decodes_big_endian_words() {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 9] {
            bytes.extend_from_slice(&word.to_be_bytes());
        }

        let words = decode_spirv(Path::new("inline"), &bytes).unwrap();

        assert_eq!(words, vec![SPIRV_MAGIC, 9]);
    }

    #[test]
    fn truncated_payload_is_invalid() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);

        assert!(matches!(
            decode_spirv(Path::new("inline"), &bytes),
            Err(InitError::InvalidShaderBytecode { .. })
        ));
    }

    #[test]
    fn load_spirv_reads_and_decodes() {
        let path = temp_file("load.spv", &SPIRV_MAGIC.to_le_bytes());

        assert_eq!(load_spirv(&path).unwrap(), vec![SPIRV_MAGIC]);
        std::fs::remove_file(path).unwrap();
    }
}
