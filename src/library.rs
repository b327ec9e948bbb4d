use crate::config::Preferences;
use crate::render::load_bitmap;
use image::RgbaImage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "tif", "tiff"];

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a plain image file name: {0}")]
    InvalidName(String),
    #[error("Unsupported image type: {0}")]
    Unsupported(String),
    #[error("Image not in library: {0}")]
    NotFound(String),
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Decoded image paired with the library name it was loaded from.
pub struct ResolvedImage {
    pub name: String,
    pub bitmap: RgbaImage,
}

/// Saved icon images living in the application-support folder.
///
/// The folder holds the files; the preference record holds the ordered list
/// of names and the current selection. Every mutation updates both.
pub struct ImageLibrary {
    dir: PathBuf,
    previous_selection: Option<String>,
}

impl ImageLibrary {
    pub fn open(dir: PathBuf) -> Self {
        let library = Self {
            dir,
            previous_selection: None,
        };
        if let Err(err) = library.ensure_dir() {
            warn!(dir = %library.dir.display(), "failed to create image folder: {err}");
        }
        library
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    /// Copy `source` into the folder, remember it and select it.
    pub fn add(&mut self, prefs: &mut Preferences, source: &Path) -> Result<String, LibraryError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| LibraryError::InvalidName(source.display().to_string()))?;
        if !is_supported_image(source) {
            return Err(LibraryError::Unsupported(name));
        }

        self.ensure_dir()?;
        let destination = self.path_of(&name);
        if destination.exists() {
            debug!(name = %name, "image already in library, keeping existing copy");
        } else {
            fs::copy(source, &destination)?;
            info!(name = %name, "added image to library");
        }

        if !prefs.saved_images.contains(&name) {
            prefs.saved_images.push(name.clone());
        }
        self.set_selection(prefs, Some(name.clone()));
        Ok(name)
    }

    /// Delete an image. If it was the selection, fall back to the image that
    /// was selected before it, then the first remaining one, then none.
    pub fn remove(&mut self, prefs: &mut Preferences, name: &str) -> Result<(), LibraryError> {
        if !is_plain_file_name(name) {
            return Err(LibraryError::InvalidName(name.to_string()));
        }

        prefs.saved_images.retain(|saved| saved != name);
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => info!(name = %name, "removed image from library"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(name = %name, "image file already gone");
            }
            Err(err) => warn!(name = %name, "failed to delete image file: {err}"),
        }

        if self.previous_selection.as_deref() == Some(name) {
            self.previous_selection = None;
        }
        if prefs.selected_image.as_deref() == Some(name) {
            let fallback = self
                .previous_selection
                .take()
                .filter(|prev| prefs.saved_images.contains(prev))
                .or_else(|| prefs.saved_images.first().cloned());
            prefs.selected_image = fallback;
        }
        Ok(())
    }

    /// Select an image already in the folder. Files present on disk but not
    /// yet in the saved list are adopted into it.
    pub fn select(&mut self, prefs: &mut Preferences, name: &str) -> Result<(), LibraryError> {
        if !is_plain_file_name(name) {
            return Err(LibraryError::InvalidName(name.to_string()));
        }
        if !self.path_of(name).is_file() {
            return Err(LibraryError::NotFound(name.to_string()));
        }
        if !prefs.saved_images.iter().any(|saved| saved == name) {
            prefs.saved_images.push(name.to_string());
        }
        self.set_selection(prefs, Some(name.to_string()));
        Ok(())
    }

    fn set_selection(&mut self, prefs: &mut Preferences, name: Option<String>) {
        if prefs.selected_image != name {
            self.previous_selection = prefs.selected_image.take();
            prefs.selected_image = name;
        }
    }

    /// Image files currently in the folder, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_supported_image(path))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn load(&self, name: &str) -> Option<RgbaImage> {
        if !is_plain_file_name(name) {
            return None;
        }
        let path = self.path_of(name);
        if !path.is_file() {
            debug!(name = %name, "saved image missing on disk");
            return None;
        }
        match load_bitmap(&path) {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                warn!(name = %name, "failed to load saved image: {err}");
                None
            }
        }
    }

    /// The image the status item should show: the selection if it loads,
    /// otherwise the first saved image that does (which becomes the new
    /// selection). `None` means the built-in default icon.
    pub fn resolve_current(&self, prefs: &mut Preferences) -> Option<ResolvedImage> {
        if let Some(name) = prefs.selected_image.clone() {
            if let Some(bitmap) = self.load(&name) {
                return Some(ResolvedImage { name, bitmap });
            }
        }

        for name in prefs.saved_images.clone() {
            if prefs.selected_image.as_deref() == Some(name.as_str()) {
                continue;
            }
            if let Some(bitmap) = self.load(&name) {
                prefs.selected_image = Some(name.clone());
                return Some(ResolvedImage { name, bitmap });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::{tempdir, TempDir};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([120, 30, 200, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn setup() -> (TempDir, TempDir, ImageLibrary) {
        let picked = tempdir().unwrap();
        let support = tempdir().unwrap();
        let library = ImageLibrary::open(support.path().join("Ikonic MenuBar"));
        (picked, support, library)
    }

    #[test]
    fn open_creates_folder() {
        let (_picked, _support, library) = setup();
        assert!(library.dir().is_dir());
    }

    #[test]
    fn add_copies_file_and_selects_it() {
        let (picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        let source = write_png(picked.path(), "cat.png", 8, 4);

        let name = library.add(&mut prefs, &source).unwrap();
        assert_eq!(name, "cat.png");
        assert!(library.path_of("cat.png").is_file());
        assert!(source.is_file());
        assert_eq!(prefs.saved_images, vec!["cat.png"]);
        assert_eq!(prefs.selected_image.as_deref(), Some("cat.png"));

        library.add(&mut prefs, &source).unwrap();
        assert_eq!(prefs.saved_images, vec!["cat.png"]);
    }

    #[test]
    fn add_rejects_unsupported_files() {
        let (picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        let notes = picked.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        assert!(matches!(
            library.add(&mut prefs, &notes),
            Err(LibraryError::Unsupported(_))
        ));
        assert!(prefs.saved_images.is_empty());
        assert!(library.list().is_empty());
    }

    #[test]
    fn add_then_remove_restores_prior_selection() {
        let (picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        let first = write_png(picked.path(), "a.png", 4, 4);
        let second = write_png(picked.path(), "b.png", 4, 4);
        let third = write_png(picked.path(), "c.png", 4, 4);

        library.add(&mut prefs, &first).unwrap();
        library.add(&mut prefs, &second).unwrap();
        library.add(&mut prefs, &third).unwrap();
        library.select(&mut prefs, "b.png").unwrap();

        let extra = write_png(picked.path(), "d.png", 4, 4);
        library.add(&mut prefs, &extra).unwrap();
        assert_eq!(prefs.selected_image.as_deref(), Some("d.png"));

        library.remove(&mut prefs, "d.png").unwrap();
        assert_eq!(prefs.selected_image.as_deref(), Some("b.png"));
        assert!(!library.path_of("d.png").exists());
        assert_eq!(prefs.saved_images, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn removing_last_image_falls_back_to_default() {
        let (picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        let only = write_png(picked.path(), "only.png", 4, 4);

        library.add(&mut prefs, &only).unwrap();
        library.remove(&mut prefs, "only.png").unwrap();

        assert_eq!(prefs.selected_image, None);
        assert!(prefs.saved_images.is_empty());
        assert!(library.resolve_current(&mut prefs).is_none());
    }

    #[test]
    fn remove_without_history_falls_back_to_first() {
        let (picked, support, mut library) = setup();
        let mut prefs = Preferences::default();
        for name in ["x.png", "y.png", "z.png"] {
            let source = write_png(picked.path(), name, 4, 4);
            library.add(&mut prefs, &source).unwrap();
        }

        // Fresh process: no in-memory history.
        let mut library = ImageLibrary::open(support.path().join("Ikonic MenuBar"));
        library.remove(&mut prefs, "z.png").unwrap();
        assert_eq!(prefs.selected_image.as_deref(), Some("x.png"));
    }

    #[test]
    fn removing_unselected_image_keeps_selection() {
        let (picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        for name in ["x.png", "y.png"] {
            let source = write_png(picked.path(), name, 4, 4);
            library.add(&mut prefs, &source).unwrap();
        }
        library.remove(&mut prefs, "x.png").unwrap();
        assert_eq!(prefs.selected_image.as_deref(), Some("y.png"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let (_picked, _support, mut library) = setup();
        let mut prefs = Preferences::default();
        assert!(matches!(
            library.remove(&mut prefs, "../escape.png"),
            Err(LibraryError::InvalidName(_))
        ));
        assert!(matches!(
            library.select(&mut prefs, "missing.png"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn list_enumerates_images_in_folder() {
        let (_picked, _support, library) = setup();
        write_png(library.dir(), "b.png", 2, 2);
        fs::write(library.dir().join("a.PNG"), b"png bytes").unwrap();
        fs::write(library.dir().join("preferences.json"), "{}").unwrap();
        fs::create_dir(library.dir().join("folder.png")).unwrap();

        assert_eq!(library.list(), vec!["a.PNG", "b.png"]);
    }

    #[test]
    fn resolve_skips_broken_selection() {
        let (_picked, _support, library) = setup();
        let mut prefs = Preferences::default();
        fs::write(library.dir().join("broken.png"), b"nope").unwrap();
        write_png(library.dir(), "good.png", 6, 3);
        prefs.saved_images = vec!["broken.png".into(), "gone.png".into(), "good.png".into()];
        prefs.selected_image = Some("broken.png".into());

        let resolved = library.resolve_current(&mut prefs).unwrap();
        assert_eq!(resolved.name, "good.png");
        assert_eq!(resolved.bitmap.dimensions(), (6, 3));
        assert_eq!(prefs.selected_image.as_deref(), Some("good.png"));
    }
}
