//! Texture container decoding.
//!
//! Turns DDS files (block-compressed, pre-mipmapped) and plain images
//! (PNG, JPEG) into [`DecodedImage`], the CPU-side form a GPU upload
//! consumes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ddsfile::{D3DFormat, Dds, DxgiFormat};
use meshview_rhi::texture::{MipLevel, TextureFormat};
use tracing::{debug, warn};

use crate::error::{ResourceError, ResourceResult};

/// One decoded mip level, owned.
#[derive(Debug, Clone)]
pub struct DecodedMip {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Raw pixel bytes.
    pub data: Vec<u8>,
}

/// A decoded image with its full mip chain.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    format: TextureFormat,
    mips: Vec<DecodedMip>,
}

impl DecodedImage {
    /// Decodes a DDS file, keeping whatever mip chain it carries.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the container is
    /// malformed, or the data is shorter than the header promises.
    pub fn from_dds_file(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let dds = Dds::read(BufReader::new(file))?;

        let format = dds_format(&dds);
        if format == TextureFormat::Unknown {
            warn!("Unrecognized pixel format in {:?}", path);
        }

        let width = dds.get_width();
        let height = dds.get_height();
        let mip_count = dds.get_num_mipmap_levels().max(1);

        let data = dds.get_data(0).map_err(|e| ResourceError::InvalidDds {
            path: path.to_path_buf(),
            message: format!("No texture data: {}", e),
        })?;

        let mut mips = Vec::with_capacity(mip_count as usize);
        let mut cursor = 0usize;

        for level in 0..mip_count {
            let mip_width = (width >> level).max(1);
            let mip_height = (height >> level).max(1);
            let size = level_byte_size(format, mip_width, mip_height);

            let end = cursor + size;
            if end > data.len() {
                return Err(ResourceError::InvalidDds {
                    path: path.to_path_buf(),
                    message: format!(
                        "Mip level {} needs {} bytes at offset {}, only {} available",
                        level,
                        size,
                        cursor,
                        data.len()
                    ),
                });
            }

            mips.push(DecodedMip {
                width: mip_width,
                height: mip_height,
                data: data[cursor..end].to_vec(),
            });
            cursor = end;
        }

        debug!(
            "Decoded DDS {:?}: {}x{}, {} mip level(s), {:?}",
            path, width, height, mip_count, format
        );

        Ok(Self { format, mips })
    }

    /// Decodes a plain image file (PNG, JPEG) into a single RGBA8 level.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_image_file(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let rgba = image::open(path)?.into_rgba8();
        let (width, height) = rgba.dimensions();

        debug!("Decoded image {:?}: {}x{}", path, width, height);

        Ok(Self {
            format: TextureFormat::Rgba8Srgb,
            mips: vec![DecodedMip {
                width,
                height,
                data: rgba.into_raw(),
            }],
        })
    }

    /// Pixel format of every level.
    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The decoded mip chain, base level first.
    #[inline]
    pub fn mips(&self) -> &[DecodedMip] {
        &self.mips
    }

    /// Borrowed mip descriptions for a GPU upload.
    pub fn mip_levels(&self) -> Vec<MipLevel<'_>> {
        self.mips
            .iter()
            .map(|mip| MipLevel {
                width: mip.width,
                height: mip.height,
                data: &mip.data,
            })
            .collect()
    }
}

/// Maps the container's pixel format, preferring the DX10 header.
fn dds_format(dds: &Dds) -> TextureFormat {
    if let Some(dxgi) = dds.get_dxgi_format() {
        return match dxgi {
            DxgiFormat::BC1_UNorm => TextureFormat::Bc1Unorm,
            DxgiFormat::BC1_UNorm_sRGB => TextureFormat::Bc1Srgb,
            DxgiFormat::BC2_UNorm => TextureFormat::Bc2Unorm,
            DxgiFormat::BC2_UNorm_sRGB => TextureFormat::Bc2Srgb,
            DxgiFormat::BC3_UNorm => TextureFormat::Bc3Unorm,
            DxgiFormat::BC3_UNorm_sRGB => TextureFormat::Bc3Srgb,
            DxgiFormat::BC5_UNorm => TextureFormat::Bc5Unorm,
            DxgiFormat::BC5_SNorm => TextureFormat::Bc5Snorm,
            DxgiFormat::R8G8B8A8_UNorm => TextureFormat::Rgba8Unorm,
            DxgiFormat::R8G8B8A8_UNorm_sRGB => TextureFormat::Rgba8Srgb,
            DxgiFormat::B8G8R8A8_UNorm => TextureFormat::Bgra8Unorm,
            DxgiFormat::B8G8R8A8_UNorm_sRGB => TextureFormat::Bgra8Srgb,
            _ => TextureFormat::Unknown,
        };
    }

    match dds.get_d3d_format() {
        Some(D3DFormat::DXT1) => TextureFormat::Bc1Unorm,
        Some(D3DFormat::DXT3) => TextureFormat::Bc2Unorm,
        Some(D3DFormat::DXT5) => TextureFormat::Bc3Unorm,
        Some(D3DFormat::A8R8G8B8) => TextureFormat::Bgra8Unorm,
        Some(D3DFormat::A8B8G8R8) => TextureFormat::Rgba8Unorm,
        _ => TextureFormat::Unknown,
    }
}

/// Byte size of one mip level.
///
/// Block-compressed formats are stored as 4x4 texel blocks; unknown
/// formats are sized like BC1, matching the upload fallback.
fn level_byte_size(format: TextureFormat, width: u32, height: u32) -> usize {
    let blocks = (width.div_ceil(4) as usize) * (height.div_ceil(4) as usize);
    match format {
        TextureFormat::Bc1Unorm | TextureFormat::Bc1Srgb | TextureFormat::Unknown => blocks * 8,
        TextureFormat::Bc2Unorm
        | TextureFormat::Bc2Srgb
        | TextureFormat::Bc3Unorm
        | TextureFormat::Bc3Srgb
        | TextureFormat::Bc5Unorm
        | TextureFormat::Bc5Snorm => blocks * 16,
        TextureFormat::Rgba8Unorm
        | TextureFormat::Rgba8Srgb
        | TextureFormat::Bgra8Unorm
        | TextureFormat::Bgra8Srgb => (width as usize) * (height as usize) * 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_byte_size_bc1() {
        // 8x8 = 4 blocks of 8 bytes
        assert_eq!(level_byte_size(TextureFormat::Bc1Srgb, 8, 8), 32);
        // Sub-block sizes round up to one block
        assert_eq!(level_byte_size(TextureFormat::Bc1Srgb, 1, 1), 8);
        assert_eq!(level_byte_size(TextureFormat::Bc1Srgb, 5, 4), 16);
    }

    #[test]
    fn test_level_byte_size_bc3() {
        assert_eq!(level_byte_size(TextureFormat::Bc3Unorm, 4, 4), 16);
        assert_eq!(level_byte_size(TextureFormat::Bc3Unorm, 16, 16), 256);
    }

    #[test]
    fn test_level_byte_size_rgba8() {
        assert_eq!(level_byte_size(TextureFormat::Rgba8Srgb, 16, 16), 1024);
        assert_eq!(level_byte_size(TextureFormat::Bgra8Unorm, 1, 1), 4);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = DecodedImage::from_dds_file(Path::new("does/not/exist.dds")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }

    #[test]
    fn test_mip_levels_borrow_decoded_data() {
        let image = DecodedImage {
            format: TextureFormat::Rgba8Srgb,
            mips: vec![
                DecodedMip {
                    width: 2,
                    height: 2,
                    data: vec![0u8; 16],
                },
                DecodedMip {
                    width: 1,
                    height: 1,
                    data: vec![0u8; 4],
                },
            ],
        };

        let levels = image.mip_levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].width, 2);
        assert_eq!(levels[1].data.len(), 4);
    }
}
