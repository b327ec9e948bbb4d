use crate::app::App;
use crate::config::{MAX_ICON_HEIGHT, MIN_ICON_HEIGHT};
use crate::library::SUPPORTED_EXTENSIONS;
use crate::render::RenderedIcon;
use objc2::rc::Retained;
use objc2::runtime::{AnyClass, AnyObject, ClassBuilder, Sel};
use objc2::{msg_send, sel, AnyThread, MainThreadMarker};
use objc2_app_kit::{
    NSCellImagePosition, NSColor, NSControlStateValueOff, NSControlStateValueOn, NSFont, NSImage,
    NSMenu, NSMenuItem, NSStatusBar, NSStatusItem, NSVariableStatusItemLength,
};
use objc2_foundation::{ns_string, NSData, NSMutableAttributedString, NSRange, NSSize, NSString};
use rfd::FileDialog;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Once;
use tracing::{debug, warn};

pub const QUIT_ID: &str = "quit";
pub const ADD_IMAGE_ID: &str = "add_image";
pub const REMOVE_IMAGE_ID: &str = "remove_image";
pub const TOGGLE_OVERLAY_ID: &str = "toggle_overlay";
pub const HEIGHT_UP_ID: &str = "height_up";
pub const HEIGHT_DOWN_ID: &str = "height_down";
pub const LAUNCH_AT_LOGIN_ID: &str = "launch_at_login";
pub const SELECT_PREFIX: &str = "select_";
pub const STRENGTH_PREFIX: &str = "strength_";

const DEFAULT_SYMBOL: &str = "photo";

thread_local! {
    static MENU_ACTIONS: RefCell<HashMap<isize, String>> = RefCell::new(HashMap::new());
    static PENDING_EVENT: RefCell<Option<String>> = RefCell::new(None);
    static ACTION_WAKER: RefCell<Option<Box<dyn Fn()>>> = RefCell::new(None);
}

pub fn take_pending_event() -> Option<String> {
    PENDING_EVENT.with(|p| p.borrow_mut().take())
}

/// Called after a menu action is recorded so the event loop wakes up for it.
pub fn set_action_waker(waker: impl Fn() + 'static) {
    ACTION_WAKER.with(|w| *w.borrow_mut() = Some(Box::new(waker)));
}

static REGISTER_HANDLER: Once = Once::new();
static mut HANDLER_INSTANCE: *const AnyObject = std::ptr::null();

unsafe extern "C" fn menu_action_triggered(
    _this: *const AnyObject,
    _sel: Sel,
    sender: *const AnyObject,
) {
    if sender.is_null() {
        return;
    }
    let tag: isize = msg_send![sender, tag];
    let action = MENU_ACTIONS.with(|actions| actions.borrow().get(&tag).cloned());
    let Some(action_id) = action else {
        return;
    };
    PENDING_EVENT.with(|p| {
        *p.borrow_mut() = Some(action_id);
    });
    ACTION_WAKER.with(|w| {
        if let Some(wake) = w.borrow().as_ref() {
            wake();
        }
    });
}

fn ensure_menu_handler() -> *const AnyObject {
    REGISTER_HANDLER.call_once(|| unsafe {
        let Some(superclass) = AnyClass::get(c"NSObject") else {
            return;
        };
        let Some(mut builder) = ClassBuilder::new(c"IkonicMenuHandler", superclass) else {
            warn!("menu handler class already registered");
            return;
        };
        builder.add_method(
            sel!(menuActionTriggered:),
            menu_action_triggered as unsafe extern "C" fn(*const AnyObject, Sel, *const AnyObject),
        );
        let cls = builder.register();
        let instance: *const AnyObject = msg_send![cls, new];
        HANDLER_INSTANCE = instance;
    });
    unsafe { HANDLER_INSTANCE }
}

/// Native open panel limited to the image types the library accepts.
pub fn pick_image() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Choose a menu bar image")
        .add_filter("Images", SUPPORTED_EXTENSIONS)
        .pick_file()
}

pub struct TrayManager {
    item: Option<Retained<NSStatusItem>>,
    mtm: MainThreadMarker,
}

impl TrayManager {
    pub fn new() -> Self {
        let mtm = MainThreadMarker::new().expect("must be called on main thread");
        ensure_menu_handler();
        Self {
            item: None,
            mtm,
        }
    }

    fn ensure_item(&mut self) -> &Retained<NSStatusItem> {
        self.item.get_or_insert_with(|| {
            let status_bar = NSStatusBar::systemStatusBar();
            status_bar.statusItemWithLength(NSVariableStatusItemLength)
        })
    }

    /// Show the rendered icon, or the system default when there is none.
    pub fn set_icon(&mut self, icon: Option<&RenderedIcon>) {
        let mtm = self.mtm;
        let image = icon.and_then(icon_to_nsimage).or_else(default_icon);
        let item = self.ensure_item();
        let Some(button) = item.button(mtm) else {
            return;
        };
        button.setImage(image.as_deref());
        button.setImagePosition(NSCellImagePosition::ImageOnly);
        button.setTitle(&NSString::from_str(""));
        if image.is_none() {
            // No symbol either: keep the item clickable.
            button.setTitle(&NSString::from_str("Ikonic"));
        }
    }

    /// Rebuild the settings menu from the current preferences.
    pub fn rebuild_menu(&mut self, app: &App) {
        let menu = build_settings_menu(app, self.mtm);
        let item = self.ensure_item();
        item.setMenu(Some(&menu));
    }
}

fn icon_to_nsimage(icon: &RenderedIcon) -> Option<Retained<NSImage>> {
    let bytes = match icon.to_png() {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("failed to encode icon: {err}");
            return None;
        }
    };
    let data = NSData::with_bytes(&bytes);
    let image = NSImage::initWithData(NSImage::alloc(), &data)?;
    let (width, height) = icon.point_size();
    image.setSize(NSSize::new(width, height));
    image.setTemplate(false);
    Some(image)
}

fn default_icon() -> Option<Retained<NSImage>> {
    let image = NSImage::imageWithSystemSymbolName_accessibilityDescription(
        &NSString::from_str(DEFAULT_SYMBOL),
        Some(ns_string!("Default Icon")),
    )?;
    image.setTemplate(true);
    Some(image)
}

// ── Menu builder ──

fn build_settings_menu(app: &App, mtm: MainThreadMarker) -> Retained<NSMenu> {
    let prefs = app.preferences();
    unsafe {
        let menu = NSMenu::new(mtm);
        menu.setAutoenablesItems(false);
        let mut tag: isize = 100;

        MENU_ACTIONS.with(|actions| {
            let mut actions = actions.borrow_mut();
            actions.clear();

            let version = env!("CARGO_PKG_VERSION");
            menu.addItem(&make_info_item(&format!("Ikonic MenuBar v{}", version), mtm));
            menu.addItem(&NSMenuItem::separatorItem(mtm));

            // Saved images, with thumbnails
            let names = app.saved_image_names();
            if names.is_empty() {
                menu.addItem(&make_info_item("No saved images", mtm));
            }
            for name in &names {
                let item = make_action_item(name, tag, mtm);
                if prefs.selected_image.as_deref() == Some(name.as_str()) {
                    item.setState(NSControlStateValueOn);
                }
                if let Some(preview) = app.preview(name).as_ref().and_then(icon_to_nsimage) {
                    item.setImage(Some(&preview));
                }
                actions.insert(tag, format!("{}{}", SELECT_PREFIX, name));
                tag += 1;
                menu.addItem(&item);
            }

            menu.addItem(&NSMenuItem::separatorItem(mtm));

            let add_item = make_action_item("Add Image…", tag, mtm);
            actions.insert(tag, ADD_IMAGE_ID.to_string());
            tag += 1;
            menu.addItem(&add_item);

            let remove_item = make_action_item("Remove Selected Image", tag, mtm);
            remove_item.setEnabled(prefs.selected_image.is_some());
            actions.insert(tag, REMOVE_IMAGE_ID.to_string());
            tag += 1;
            menu.addItem(&remove_item);

            menu.addItem(&NSMenuItem::separatorItem(mtm));

            // White mask
            let overlay_item = make_action_item("Apply White Mask", tag, mtm);
            overlay_item.setState(state_for(prefs.overlay_enabled));
            actions.insert(tag, TOGGLE_OVERLAY_ID.to_string());
            tag += 1;
            menu.addItem(&overlay_item);

            let strength_sub_item = NSMenuItem::new(mtm);
            strength_sub_item.setTitle(&NSString::from_str("Mask Strength"));
            let strength_sub = NSMenu::new(mtm);
            let current_step = (prefs.overlay_strength * 10.0).round() as u32;
            for step in 0..=10_u32 {
                let percent = step * 10;
                let item = make_action_item(&format!("{}%", percent), tag, mtm);
                if step == current_step {
                    item.setState(NSControlStateValueOn);
                }
                actions.insert(tag, format!("{}{}", STRENGTH_PREFIX, percent));
                tag += 1;
                strength_sub.addItem(&item);
            }
            strength_sub_item.setSubmenu(Some(&strength_sub));
            menu.addItem(&strength_sub_item);

            menu.addItem(&NSMenuItem::separatorItem(mtm));

            // Height: [label] [−] [+]
            menu.addItem(&make_info_item(
                &format!("Menu Bar Height: {} pt", prefs.icon_height),
                mtm,
            ));
            let down_item = make_action_item("−  Smaller", tag, mtm);
            down_item.setEnabled(prefs.icon_height > MIN_ICON_HEIGHT);
            actions.insert(tag, HEIGHT_DOWN_ID.to_string());
            tag += 1;
            menu.addItem(&down_item);

            let up_item = make_action_item("+  Larger", tag, mtm);
            up_item.setEnabled(prefs.icon_height < MAX_ICON_HEIGHT);
            actions.insert(tag, HEIGHT_UP_ID.to_string());
            tag += 1;
            menu.addItem(&up_item);

            menu.addItem(&NSMenuItem::separatorItem(mtm));

            let login_item = make_action_item("Launch at Login", tag, mtm);
            login_item.setState(state_for(prefs.launch_at_login));
            actions.insert(tag, LAUNCH_AT_LOGIN_ID.to_string());
            tag += 1;
            menu.addItem(&login_item);

            menu.addItem(&NSMenuItem::separatorItem(mtm));

            let quit_item = make_action_item("Quit", tag, mtm);
            actions.insert(tag, QUIT_ID.to_string());
            menu.addItem(&quit_item);

            debug!(actions = actions.len(), "settings menu rebuilt");
        });

        menu
    }
}

fn state_for(on: bool) -> isize {
    if on {
        NSControlStateValueOn
    } else {
        NSControlStateValueOff
    }
}

// ── Menu helpers ──

unsafe fn make_action_item(title: &str, tag: isize, mtm: MainThreadMarker) -> Retained<NSMenuItem> {
    let item = NSMenuItem::new(mtm);
    item.setTitle(&NSString::from_str(title));
    item.setEnabled(true);
    item.setTag(tag);
    item.setAction(Some(sel!(menuActionTriggered:)));
    let handler = ensure_menu_handler();
    let _: () = msg_send![&item, setTarget: handler];
    item
}

/// Non-interactive item drawn in label color instead of grayed out.
fn make_info_item(title: &str, mtm: MainThreadMarker) -> Retained<NSMenuItem> {
    unsafe {
        let item = NSMenuItem::new(mtm);
        item.setEnabled(true);
        item.setTag(-1);
        item.setAction(Some(sel!(menuActionTriggered:)));
        let handler = ensure_menu_handler();
        let _: () = msg_send![&item, setTarget: handler];
        set_label_title(&item, title);
        item
    }
}

fn set_label_title(item: &NSMenuItem, title: &str) {
    unsafe {
        let ns_text = NSString::from_str(title);
        let attr_str =
            NSMutableAttributedString::initWithString(NSMutableAttributedString::alloc(), &ns_text);
        let range = NSRange::new(0, title.encode_utf16().count());
        let color_key = ns_string!("NSColor");
        let color = NSColor::labelColor();
        attr_str.addAttribute_value_range(color_key, &color, range);
        let font_key = ns_string!("NSFont");
        let font = NSFont::menuFontOfSize(13.0);
        attr_str.addAttribute_value_range(font_key, &font, range);
        let _: () = msg_send![item, setAttributedTitle: &*attr_str];
    }
}
