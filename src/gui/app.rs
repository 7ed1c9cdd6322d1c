use eframe::egui;
use crate::core::{AppConfig, JobRequest, JobState};
use crate::video::{FfmpegOpener, FrameExtractor, JobEvent, JobSummary, VideoOpener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use chrono::Local;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "MOV", "mov", "mkv", "avi", "webm", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A message shown in a centered window until the user dismisses it.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

pub struct FrameSamplerApp {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub video_list: String,
    pub output_folder: String,
    pub frame_rate: String,
    /// 0.0..=1.0
    pub progress: f32,
    pub job_state: JobState,
    pub job_events: Option<mpsc::UnboundedReceiver<JobEvent>>,
    pub opener: Arc<dyn VideoOpener>,
    pub status_message: String,
    pub notice: Option<Notice>,
}

impl FrameSamplerApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let config = AppConfig::load();
        let opener = Arc::new(FfmpegOpener::from_config(&config));
        Self::with_config(config, AppConfig::config_path(), opener)
    }

    pub fn with_config(config: AppConfig, config_path: PathBuf, opener: Arc<dyn VideoOpener>) -> Self {
        Self {
            config,
            config_path,
            video_list: String::new(),
            output_folder: String::new(),
            frame_rate: "1".to_string(),
            progress: 0.0,
            job_state: JobState::new(),
            job_events: None,
            opener,
            status_message: String::new(),
            notice: None,
        }
    }

    /// A job is in flight until its `Completed` event has been handled.
    pub fn is_running(&self) -> bool {
        self.job_state.is_running() || self.job_events.is_some()
    }

    pub fn set_selected_files(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }

        self.video_list = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.status_message = format!("Selected {} video file(s)", paths.len());

        if let Some(parent) = paths[0].parent() {
            self.remember_folder(parent);
        }
    }

    pub fn set_output_folder(&mut self, folder: PathBuf) {
        self.output_folder = folder.display().to_string();
        self.remember_folder(&folder);
    }

    fn remember_folder(&mut self, folder: &Path) {
        self.config.set_last_folder(folder);
        self.save_config();
    }

    pub fn save_config(&mut self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            log::error!("Failed to save config: {}", e);
        }
    }

    fn pick_files(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Select video files")
            .add_filter("Video files", VIDEO_EXTENSIONS)
            .add_filter("All files", &["*"]);
        if let Some(folder) = self.config.last_folder() {
            dialog = dialog.set_directory(folder);
        }

        if let Some(paths) = dialog.pick_files() {
            self.set_selected_files(paths);
        }
    }

    fn pick_output_folder(&mut self) {
        let mut dialog = rfd::FileDialog::new().set_title("Select output folder");
        if let Some(folder) = self.config.last_folder() {
            dialog = dialog.set_directory(folder);
        }

        if let Some(folder) = dialog.pick_folder() {
            self.set_output_folder(folder);
        }
    }

    pub fn start_extraction(&mut self) {
        if self.is_running() {
            self.status_message = "A job is already running".to_string();
            return;
        }

        let request = match JobRequest::from_inputs(&self.video_list, &self.output_folder, &self.frame_rate) {
            Ok(request) => request,
            Err(e) => {
                self.show_error("Cannot start extraction", e.to_string());
                return;
            }
        };

        if let Err(e) = request.prepare_output_dir() {
            self.show_error("Cannot start extraction", e.to_string());
            return;
        }

        let Some(guard) = self.job_state.try_begin() else {
            self.status_message = "A job is already running".to_string();
            return;
        };

        let video_count = request.videos.len();
        self.progress = 0.0;
        match FrameExtractor::spawn_job(request, self.opener.clone(), guard) {
            Ok(receiver) => {
                self.job_events = Some(receiver);
                self.status_message = format!("Extracting frames from {} video(s)...", video_count);
            }
            Err(e) => {
                log::error!("{}", e);
                self.show_error("Cannot start extraction", e.to_string());
            }
        }
    }

    pub fn process_job_events(&mut self) {
        let Some(receiver) = self.job_events.as_mut() else {
            return;
        };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        for event in events {
            self.handle_job_event(event);
        }

        // Completed clears the receiver; a hang-up without it means the worker died.
        if disconnected && self.job_events.is_some() {
            log::error!("Extraction worker stopped without reporting completion");
            self.job_events = None;
            self.show_error(
                "Frame extraction stopped",
                "The extraction worker stopped unexpectedly. Check the log for details.".to_string(),
            );
        }
    }

    fn handle_job_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::VideoStarted { index, total, path } => {
                self.status_message = format!("Processing {}/{}: {}", index + 1, total, display_name(&path));
            }
            JobEvent::VideoFinished { path, stats, progress } => {
                self.progress = (progress / 100.0) as f32;
                self.status_message = format!(
                    "Saved {} of {} frame(s) from {} (every {})",
                    stats.saved_frames,
                    stats.decoded_frames,
                    display_name(&path),
                    stats.interval
                );
            }
            JobEvent::VideoFailed { path, error, progress } => {
                self.progress = (progress / 100.0) as f32;
                self.status_message = format!("Failed on {}: {}", display_name(&path), error);
            }
            JobEvent::Completed(summary) => {
                self.job_events = None;
                self.status_message = format!(
                    "Finished at {}: {} frame(s) saved",
                    Local::now().format("%H:%M:%S"),
                    summary.frames_saved
                );
                self.notice = Some(Self::completion_notice(&summary));
            }
        }
    }

    pub fn completion_notice(summary: &JobSummary) -> Notice {
        let mut message = format!(
            "Frame extraction complete!\n{} frame(s) saved from {} video(s).",
            summary.frames_saved, summary.videos_processed
        );
        if summary.succeeded() {
            return Notice {
                kind: NoticeKind::Info,
                title: "Done".to_string(),
                message,
            };
        }

        message.push_str(&format!("\n\n{} video(s) failed:", summary.failures.len()));
        for (path, error) in &summary.failures {
            message.push_str(&format!("\n{}: {}", display_name(path), error));
        }
        Notice {
            kind: NoticeKind::Error,
            title: "Done with errors".to_string(),
            message,
        }
    }

    fn show_error(&mut self, title: &str, message: String) {
        self.status_message = message.clone();
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            title: title.to_string(),
            message,
        });
    }
}

impl eframe::App for FrameSamplerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_job_events();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Status:");
                if self.status_message.is_empty() {
                    ui.label("Ready");
                } else {
                    ui.label(self.status_message.as_str());
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(self.notice.is_none(), |ui| {
                self.show_job_form(ui);
            });
        });

        if self.notice.is_some() {
            self.show_notice(ctx);
        }

        if self.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        if self.config.is_dirty() {
            self.save_config();
        }
    }
}

impl FrameSamplerApp {
    fn show_job_form(&mut self, ui: &mut egui::Ui) {
        let running = self.is_running();

        egui::Grid::new("job_inputs")
            .num_columns(3)
            .spacing([8.0, 8.0])
            .show(ui, |ui| {
                ui.label("Video files:");
                ui.add_enabled(
                    !running,
                    egui::TextEdit::multiline(&mut self.video_list)
                        .desired_rows(4)
                        .desired_width(400.0)
                        .hint_text("One path per line"),
                );
                if ui.add_enabled(!running, egui::Button::new("Select Files...")).clicked() {
                    self.pick_files();
                }
                ui.end_row();

                ui.label("Output folder:");
                ui.add_enabled(
                    !running,
                    egui::TextEdit::singleline(&mut self.output_folder).desired_width(400.0),
                );
                if ui.add_enabled(!running, egui::Button::new("Select Folder...")).clicked() {
                    self.pick_output_folder();
                }
                ui.end_row();

                ui.label("Frame rate:");
                ui.add_enabled(
                    !running,
                    egui::TextEdit::singleline(&mut self.frame_rate).desired_width(80.0),
                );
                ui.label("frames per second");
                ui.end_row();
            });

        ui.add_space(12.0);
        ui.vertical_centered(|ui| {
            if ui.add_enabled(!running, egui::Button::new("Start Extraction")).clicked() {
                self.start_extraction();
            }
        });

        ui.add_space(12.0);
        ui.add(egui::ProgressBar::new(self.progress).show_percentage());
    }

    fn show_notice(&mut self, ctx: &egui::Context) {
        let mut dismissed = false;

        if let Some(notice) = &self.notice {
            egui::Window::new(notice.title.as_str())
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    match notice.kind {
                        NoticeKind::Info => ui.label(notice.message.as_str()),
                        NoticeKind::Error => ui.colored_label(egui::Color32::LIGHT_RED, notice.message.as_str()),
                    };
                    ui.add_space(8.0);
                    ui.vertical_centered(|ui| {
                        if ui.button("OK").clicked() {
                            dismissed = true;
                        }
                    });
                });
        }

        if dismissed {
            self.notice = None;
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
