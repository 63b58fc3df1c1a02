#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use eframe::egui;
use geogems::app::FavoritesApp;
use geogems::config::{FavoritesConfig, OpenStreetMapConfig};

fn main() -> eframe::Result {
    // Log to stdout (if you run with `RUST_LOG=debug`).
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("GeoGems")
            .with_inner_size([1024.0, 700.0]),
        ..Default::default()
    };

    eframe::run_native(
        "GeoGems",
        options,
        Box::new(|cc| {
            Ok(Box::new(FavoritesApp::new(
                cc,
                OpenStreetMapConfig::default(),
                FavoritesConfig::default(),
            )))
        }),
    )
}
