//! Process level startup: logging, bundled fonts and the restart loop.

use std::future::Future;
use std::path::{Path, PathBuf};

use log::{info, warn};
use resvg::usvg::fontdb;

/// Exit code of a session that asks to be started again in-process
pub const RESTART_EXIT_CODE: i32 = 1000;

pub const DEFAULT_FONT: &str = "Noto Sans";

const FONTS_DIR: &str = "fonts";

pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        warn!("Logger already initialized");
    }
}

/// Runs sessions until one exits with something else than [`RESTART_EXIT_CODE`].
/// The session receives its generation, 0 for the first one.
pub async fn run_sessions<F, Fut>(mut session: F) -> i32
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = i32>,
{
    let mut generation = 0;
    loop {
        let code = session(generation).await;
        if code != RESTART_EXIT_CODE {
            info!("Application exited with code {}", code);
            return code;
        }
        generation += 1;
        info!("Restart requested, starting session #{}", generation);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontFace {
    pub family: String,
    pub path: PathBuf,
    pub weight: u16,
    pub italic: bool,
}

/// TrueType fonts shipped under `<assets>/fonts`
pub fn find_fonts(assets_dir: &Path) -> Vec<FontFace> {
    let mut paths = Vec::new();
    collect_ttf(&assets_dir.join(FONTS_DIR), &mut paths);
    paths.sort();

    let mut faces = Vec::new();
    for path in paths {
        let mut database = fontdb::Database::new();
        if let Err(e) = database.load_font_file(&path) {
            warn!("Cannot load font {}: {}", path.display(), e);
            continue;
        }
        if database.is_empty() {
            warn!("No usable face in {}", path.display());
            continue;
        }
        for face in database.faces() {
            let Some((family, _)) = face.families.first() else {
                continue;
            };
            faces.push(FontFace {
                family: family.clone(),
                path: path.clone(),
                weight: face.weight.0,
                italic: face.style != fontdb::Style::Normal,
            });
        }
    }
    info!("Found {} bundled font faces", faces.len());
    faces
}

fn collect_ttf(dir: &Path, paths: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_ttf(&path, paths);
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ttf")) {
            paths.push(path);
        }
    }
}

/// Stylesheet registering `faces` and making [`DEFAULT_FONT`] the page font
pub fn font_face_css(faces: &[FontFace]) -> String {
    let mut css = String::new();
    for face in faces {
        css.push_str(&format!(
            "@font-face {{ font-family: \"{}\"; src: url(\"file://{}\"); font-weight: {}; font-style: {}; }}\n",
            face.family,
            face.path.display(),
            face.weight,
            if face.italic { "italic" } else { "normal" },
        ));
    }
    css.push_str(&format!(
        "body {{ font-family: \"{}\", sans-serif; }}\n",
        DEFAULT_FONT
    ));
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn restart_code_starts_new_session() {
        let codes = RefCell::new(vec![0, RESTART_EXIT_CODE, RESTART_EXIT_CODE]);
        let generations = RefCell::new(Vec::new());

        let code = run_sessions(|generation| {
            generations.borrow_mut().push(generation);
            let code = codes.borrow_mut().pop().unwrap_or(0);
            async move { code }
        })
        .await;

        assert_eq!(code, 0);
        assert_eq!(*generations.borrow(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn other_codes_exit() {
        let code = run_sessions(|_| async { 3 }).await;
        assert_eq!(code, 3);
    }

    #[test]
    fn fonts_ignore_other_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = dir.path().join(FONTS_DIR).join("noto");
        std::fs::create_dir_all(&fonts).unwrap();
        std::fs::write(fonts.join("README.txt"), "fonts").unwrap();
        std::fs::write(fonts.join("Broken.ttf"), "not a font").unwrap();

        assert!(find_fonts(dir.path()).is_empty());
    }

    #[test]
    fn css_registers_faces() {
        let css = font_face_css(&[FontFace {
            family: "Noto Sans".to_string(),
            path: PathBuf::from("/opt/app/fonts/NotoSans-Bold.ttf"),
            weight: 700,
            italic: false,
        }]);
        assert!(css.contains("font-family: \"Noto Sans\"; src: url(\"file:///opt/app/fonts/NotoSans-Bold.ttf\"); font-weight: 700; font-style: normal;"));
        assert!(css.ends_with("body { font-family: \"Noto Sans\", sans-serif; }\n"));
    }
}
