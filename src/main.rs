#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod app;
mod config;
mod launch_agent;
mod library;
mod notify;
mod render;
#[cfg(target_os = "macos")]
mod ui;

use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ikonic_menubar=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(not(target_os = "macos"))]
fn main() {
    init_logging();
    tracing::error!("ikonic-menubar lives in the macOS status bar; this platform is not supported");
    std::process::exit(1);
}

#[cfg(target_os = "macos")]
fn main() {
    use app::App;
    use std::path::PathBuf;
    use tao::event::Event;
    use tao::event_loop::{ControlFlow, EventLoopBuilder};
    use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
    use tracing::{debug, info};
    use ui::tray::{
        pick_image, set_action_waker, take_pending_event, TrayManager, ADD_IMAGE_ID,
        HEIGHT_DOWN_ID, HEIGHT_UP_ID, LAUNCH_AT_LOGIN_ID, QUIT_ID, REMOVE_IMAGE_ID,
        SELECT_PREFIX, STRENGTH_PREFIX, TOGGLE_OVERLAY_ID,
    };

    #[derive(Debug)]
    enum AppEvent {
        SettingsChanged,
        MenuAction,
        ImagePicked(PathBuf),
    }

    init_logging();
    info!("Ikonic MenuBar v{}", env!("CARGO_PKG_VERSION"));

    let mut event_loop = EventLoopBuilder::<AppEvent>::with_user_event().build();
    event_loop.set_activation_policy(ActivationPolicy::Accessory);

    let proxy = event_loop.create_proxy();
    {
        let proxy = proxy.clone();
        notify::subscribe(move || {
            let _ = proxy.send_event(AppEvent::SettingsChanged);
        });
    }
    {
        let proxy = proxy.clone();
        set_action_waker(move || {
            let _ = proxy.send_event(AppEvent::MenuAction);
        });
    }

    let mut app = App::new();
    let mut tray = TrayManager::new();
    tray.set_icon(app.current_icon().as_ref());
    tray.rebuild_menu(&app);
    info!(folder = %app.image_folder().display(), "status item ready");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::UserEvent(AppEvent::SettingsChanged) => {
                debug!("re-rendering status item");
                tray.set_icon(app.current_icon().as_ref());
                tray.rebuild_menu(&app);
            }
            Event::UserEvent(AppEvent::ImagePicked(path)) => app.add_image(&path),
            _ => {}
        }

        // Handle native menu events
        if let Some(action) = take_pending_event() {
            match action.as_str() {
                QUIT_ID => *control_flow = ControlFlow::Exit,
                ADD_IMAGE_ID => {
                    // Hand the picked file back to the loop before touching the library.
                    if let Some(path) = pick_image() {
                        let _ = proxy.send_event(AppEvent::ImagePicked(path));
                    }
                }
                REMOVE_IMAGE_ID => app.remove_selected_image(),
                TOGGLE_OVERLAY_ID => app.toggle_overlay(),
                HEIGHT_UP_ID => app.increase_height(),
                HEIGHT_DOWN_ID => app.decrease_height(),
                LAUNCH_AT_LOGIN_ID => app.toggle_launch_at_login(),
                _ => {
                    if let Some(percent) = action.strip_prefix(STRENGTH_PREFIX) {
                        if let Ok(percent) = percent.parse::<u32>() {
                            app.set_overlay_strength(percent as f32 / 100.0);
                        }
                    } else if let Some(name) = action.strip_prefix(SELECT_PREFIX) {
                        app.select_image(name);
                    }
                }
            }
        }
    });
}
