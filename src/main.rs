mod core;
mod gui;
mod video;

use eframe::egui;
use gui::FrameSamplerApp;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([640.0, 360.0])
            .with_title("Video Frame Extractor"),
        ..Default::default()
    };

    eframe::run_native(
        "Frame Sampler",
        options,
        Box::new(|cc| Ok(Box::new(FrameSamplerApp::new(cc)))),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
