use crate::config::{app_support_dir, Preferences, PREFERENCES_FILE};
use crate::launch_agent;
use crate::library::ImageLibrary;
use crate::notify;
use crate::render::{render_status_icon, RenderOptions, RenderedIcon};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct App {
    prefs: Preferences,
    prefs_path: PathBuf,
    library: ImageLibrary,
}

impl App {
    pub fn new() -> Self {
        let mut app = Self::with_root(app_support_dir());
        app.prefs.launch_at_login = launch_agent::is_enabled();
        app
    }

    /// Controller rooted at an explicit application-support folder.
    pub fn with_root(root: PathBuf) -> Self {
        let prefs_path = root.join(PREFERENCES_FILE);
        let prefs = Preferences::load_from(&prefs_path);
        let library = ImageLibrary::open(root);
        debug!(
            root = %library.dir().display(),
            saved = prefs.saved_images.len(),
            "loaded preferences"
        );
        Self {
            prefs,
            prefs_path,
            library,
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn image_folder(&self) -> &Path {
        self.library.dir()
    }

    pub fn saved_image_names(&self) -> Vec<String> {
        self.library.list()
    }

    /// Rendered status icon, or `None` when the default icon should show.
    pub fn current_icon(&mut self) -> Option<RenderedIcon> {
        let before = self.prefs.selected_image.clone();
        let resolved = self.library.resolve_current(&mut self.prefs);
        if self.prefs.selected_image != before {
            // Selection fell through to another saved image; remember it.
            self.prefs.save_to(&self.prefs_path);
        }
        let resolved = resolved?;
        debug!(name = %resolved.name, "rendering status icon");
        Some(render_status_icon(
            &resolved.bitmap,
            &RenderOptions::status_item(&self.prefs),
        ))
    }

    pub fn preview(&self, name: &str) -> Option<RenderedIcon> {
        let bitmap = self.library.load(name)?;
        Some(render_status_icon(&bitmap, &RenderOptions::preview(&self.prefs)))
    }

    pub fn select_image(&mut self, name: &str) {
        match self.library.select(&mut self.prefs, name) {
            Ok(()) => self.commit(),
            Err(err) => warn!(name = %name, "cannot select image: {err}"),
        }
    }

    pub fn add_image(&mut self, source: &Path) {
        match self.library.add(&mut self.prefs, source) {
            Ok(name) => {
                info!(name = %name, "selected new image");
                self.commit();
            }
            Err(err) => warn!(source = %source.display(), "cannot add image: {err}"),
        }
    }

    pub fn remove_selected_image(&mut self) {
        let Some(name) = self.prefs.selected_image.clone() else {
            return;
        };
        match self.library.remove(&mut self.prefs, &name) {
            Ok(()) => self.commit(),
            Err(err) => warn!(name = %name, "cannot remove image: {err}"),
        }
    }

    pub fn toggle_overlay(&mut self) {
        self.prefs.overlay_enabled = !self.prefs.overlay_enabled;
        self.commit();
    }

    pub fn set_overlay_strength(&mut self, strength: f32) {
        self.prefs.set_overlay_strength(strength);
        self.commit();
    }

    pub fn increase_height(&mut self) {
        self.prefs.adjust_icon_height(1);
        self.commit();
    }

    pub fn decrease_height(&mut self) {
        self.prefs.adjust_icon_height(-1);
        self.commit();
    }

    pub fn toggle_launch_at_login(&mut self) {
        self.prefs.launch_at_login = !self.prefs.launch_at_login;
        launch_agent::set_enabled(self.prefs.launch_at_login);
        self.commit();
    }

    fn commit(&mut self) {
        self.prefs.save_to(&self.prefs_path);
        notify::post_settings_changed();
    }
}
