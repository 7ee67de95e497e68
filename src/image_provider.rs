//! Images addressed by symbolic id (`logo`, `logo.svg`, ...).
//!
//! Vector images are rendered at the size they declare into a fully
//! transparent surface. Failures never propagate: the caller gets an empty
//! image and the reason is logged.

use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use log::{debug, warn};
use resvg::{tiny_skia, usvg};

const IMAGES_DIR: &str = "images";
const EXTENSIONS: [&str; 3] = ["svg", "png", "jpg"];

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Decoded image, empty when `id` cannot be loaded
    async fn request_image(&self, id: &str) -> RgbaImage;
}

/// Images of the packaged assets directory
#[derive(Debug, Clone)]
pub struct AssetImageProvider {
    images_dir: PathBuf,
}

impl AssetImageProvider {
    pub fn new(assets_dir: impl AsRef<Path>) -> Self {
        Self {
            images_dir: assets_dir.as_ref().join(IMAGES_DIR),
        }
    }

    /// File backing `id`, trying known extensions when `id` has none
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if id.is_empty() || escapes {
            warn!("Rejected image id `{}`", id);
            return None;
        }

        let direct = self.images_dir.join(relative);
        if direct.is_file() {
            return Some(direct);
        }
        EXTENSIONS
            .iter()
            .map(|extension| self.images_dir.join(format!("{}.{}", id, extension)))
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl ImageProvider for AssetImageProvider {
    async fn request_image(&self, id: &str) -> RgbaImage {
        let Some(path) = self.resolve(id) else {
            warn!("No image for `{}`", id);
            return empty_image();
        };

        match tokio::task::spawn_blocking(move || load_image(&path)).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Image decoding of `{}` aborted: {}", id, e);
                empty_image()
            }
        }
    }
}

pub fn empty_image() -> RgbaImage {
    RgbaImage::new(0, 0)
}

/// Renders an SVG file, or decodes it as a raster image when it is not one
pub fn load_image(path: &Path) -> RgbaImage {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Cannot read `{}`: {}", path.display(), e);
            return empty_image();
        }
    };

    match usvg::Tree::from_data(&data, &usvg::Options::default()) {
        Ok(tree) => render_svg(&tree, path),
        Err(svg_error) => {
            debug!("`{}` is not an svg ({}), decoding as raster", path.display(), svg_error);
            match image::load_from_memory(&data) {
                Ok(image) => image.to_rgba8(),
                Err(e) => {
                    warn!("Cannot decode `{}`: {}", path.display(), e);
                    empty_image()
                }
            }
        }
    }
}

fn render_svg(tree: &usvg::Tree, path: &Path) -> RgbaImage {
    let size = tree.size();
    let (width, height) = (size.width().ceil() as u32, size.height().ceil() as u32);

    // Zero-initialized, so untouched pixels stay transparent.
    let Some(mut pixmap) = tiny_skia::Pixmap::new(width, height) else {
        warn!("Cannot allocate {}x{} surface for `{}`", width, height, path.display());
        return empty_image();
    };
    resvg::render(tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut image = RgbaImage::new(width, height);
    for (target, source) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = source.demultiply();
        *target = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}
