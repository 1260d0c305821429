use crate::app::MediaConverterApp;
use eframe::egui;
use media_converter::constants::{APP_NAME, APP_VERSION, AUDIO_BITRATES, FRAME_RATES, MAX_BATCH_FILES, MAX_VBR_QUALITY};
use media_converter::conversion::{AudioFormat, MediaMode, Resolution, VideoFormat};
use media_converter::events::ProgressMode;
use media_converter::probe::{ExecutableReport, VendorStatus};
use media_converter::state::DialogKind;
use std::time::Duration;

const CARD_FILL: egui::Color32 = egui::Color32::from_gray(30);
const CARD_STROKE: egui::Color32 = egui::Color32::from_gray(45);

fn card(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::none()
        .fill(CARD_FILL)
        .stroke(egui::Stroke::new(1.0, CARD_STROKE))
        .rounding(10.0)
        .inner_margin(16.0)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.vertical(|ui| {
                ui.heading(egui::RichText::new(title).color(egui::Color32::WHITE).size(17.0));
                ui.add_space(8.0);
                add_contents(ui);
            });
        });
}

fn status_color(status: VendorStatus) -> egui::Color32 {
    match status {
        VendorStatus::Detected => egui::Color32::GREEN,
        VendorStatus::NotDetected => egui::Color32::GRAY,
        VendorStatus::Failed => egui::Color32::RED,
    }
}

impl eframe::App for MediaConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        let mut style = (*ctx.style()).clone();
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.visuals.dark_mode = true;
        style.visuals.window_fill = egui::Color32::from_gray(20);
        style.visuals.panel_fill = egui::Color32::from_gray(25);
        style.visuals.extreme_bg_color = egui::Color32::from_gray(15);
        ctx.set_style(style);

        let before = self.config.clone();

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(egui::Color32::from_gray(15)).inner_margin(12.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(egui::RichText::new(APP_NAME).size(24.0).color(egui::Color32::WHITE).strong());
                    ui.label(egui::RichText::new(format!("v{}", APP_VERSION)).color(egui::Color32::GRAY));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("🔧 FFmpeg Library").clicked() {
                            self.show_library = true;
                            self.check_executables();
                        }
                    });
                });
            });

        egui::TopBottomPanel::bottom("controls")
            .frame(egui::Frame::none().fill(egui::Color32::from_gray(15)).inner_margin(12.0))
            .show(ctx, |ui| self.show_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.columns(2, |columns| {
                    self.show_file_list(&mut columns[0]);
                    self.show_options(&mut columns[1]);
                });
            });
        });

        self.show_library_window(ctx);
        self.show_cancel_confirmation(ctx);
        self.show_dialog(ctx);

        if self.config != before {
            if self.config.hardware_acceleration != before.hardware_acceleration {
                self.on_hardware_toggled();
            } else {
                self.save_config();
            }
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.shutdown();
        }

        if self.data.is_processing() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

impl MediaConverterApp {
    fn show_file_list(&mut self, ui: &mut egui::Ui) {
        let idle = !self.data.is_processing();
        card(ui, &format!("📁 Files ({}/{})", self.batch.len(), MAX_BATCH_FILES), |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.add_enabled_ui(idle, |ui| {
                    if ui.add_enabled(!self.batch.is_full(), egui::Button::new("➕ Add")).clicked() {
                        self.add_files();
                    }
                    if ui.button("➖ Remove").clicked() {
                        self.remove_selected();
                    }
                    if ui.button("🗑 Clear").clicked() {
                        self.clear_files();
                    }
                    if ui.button("⬆").clicked() {
                        self.move_selected(true);
                    }
                    if ui.button("⬇").clicked() {
                        self.move_selected(false);
                    }
                });
            });

            egui::Frame::none()
                .fill(egui::Color32::from_gray(20))
                .rounding(6.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    ui.set_min_height(260.0);
                    ui.set_width(ui.available_width());
                    if self.batch.is_empty() {
                        ui.label(egui::RichText::new("No files added").color(egui::Color32::GRAY));
                    }
                    let names: Vec<String> = self.batch.paths().iter().map(|p| self.display_name(p)).collect();
                    for (index, name) in names.into_iter().enumerate() {
                        let selected = self.selected == Some(index);
                        if ui.selectable_label(selected, format!("{}. {}", index + 1, name)).clicked() {
                            self.selected = Some(index);
                        }
                    }
                });

            ui.horizontal(|ui| {
                ui.checkbox(&mut self.config.show_full_path, "Show full path");
                let has_selection = self.selected.is_some();
                if ui.add_enabled(has_selection, egui::Button::new("ℹ Info")).clicked() {
                    self.show_media_info();
                }
                if ui.add_enabled(has_selection, egui::Button::new("▶ Play")).clicked() {
                    self.play_selected();
                }
            });
        });
    }

    fn show_options(&mut self, ui: &mut egui::Ui) {
        ui.add_enabled_ui(!self.data.is_processing(), |ui| {
            card(ui, "🎛 Mode", |ui| {
                ui.horizontal(|ui| {
                    for mode in [MediaMode::Audio, MediaMode::Video] {
                        ui.radio_value(&mut self.config.mode, mode.as_str().to_string(), mode.as_str());
                    }
                });
            });
            ui.add_space(8.0);

            if self.config.mode == MediaMode::Video.as_str() {
                self.show_video_options(ui);
            } else {
                self.show_audio_options(ui);
            }
            ui.add_space(8.0);

            card(ui, "⚙ General", |ui| {
                ui.checkbox(&mut self.config.keep_metadata, "Keep metadata");
                ui.checkbox(&mut self.config.normalize_audio, "Normalize audio loudness");
                ui.separator();
                ui.label(egui::RichText::new("Destination:").strong());
                ui.horizontal(|ui| {
                    let label = self
                        .config
                        .dest_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "Not set".to_string());
                    ui.label(label);
                    if ui.button("📂 Browse").clicked() {
                        self.browse_destination();
                    }
                });
                ui.checkbox(&mut self.config.always_ask_destination, "Always ask for destination");
            });
        });
    }

    fn show_audio_options(&mut self, ui: &mut egui::Ui) {
        card(ui, "🎵 Audio Options", |ui| {
            egui::Grid::new("audio_options")
                .num_columns(2)
                .spacing([16.0, 10.0])
                .show(ui, |ui| {
                    ui.label(egui::RichText::new("Format:").strong());
                    egui::ComboBox::from_id_source("audio_format")
                        .selected_text(self.config.audio_format.to_uppercase())
                        .show_ui(ui, |ui| {
                            for format in AudioFormat::ALL {
                                ui.selectable_value(
                                    &mut self.config.audio_format,
                                    format.as_str().to_string(),
                                    format.as_str().to_uppercase(),
                                );
                            }
                        });
                    ui.end_row();

                    let supports_vbr = self
                        .config
                        .audio_format
                        .parse::<AudioFormat>()
                        .map(|f| f.supports_vbr())
                        .unwrap_or(false);
                    if !supports_vbr {
                        self.config.audio_vbr = false;
                    }

                    ui.label(egui::RichText::new("Quality:").strong());
                    ui.add_enabled(supports_vbr, egui::Checkbox::new(&mut self.config.audio_vbr, "Variable bitrate"));
                    ui.end_row();

                    if self.config.audio_vbr {
                        ui.label(egui::RichText::new("VBR level:").strong());
                        ui.add(egui::Slider::new(&mut self.config.audio_quality, 0..=MAX_VBR_QUALITY).text("0 = best"));
                    } else {
                        ui.label(egui::RichText::new("Bitrate:").strong());
                        egui::ComboBox::from_id_source("audio_bitrate")
                            .selected_text(&self.config.audio_bitrate)
                            .show_ui(ui, |ui| {
                                for bitrate in AUDIO_BITRATES {
                                    ui.selectable_value(&mut self.config.audio_bitrate, bitrate.to_string(), *bitrate);
                                }
                            });
                    }
                    ui.end_row();
                });
            ui.checkbox(&mut self.config.join_audio, "Join all files into one");
        });
    }

    fn show_video_options(&mut self, ui: &mut egui::Ui) {
        let codecs = self.video_codecs();
        card(ui, "🎬 Video Options", |ui| {
            egui::Grid::new("video_options")
                .num_columns(2)
                .spacing([16.0, 10.0])
                .show(ui, |ui| {
                    ui.label(egui::RichText::new("Format:").strong());
                    egui::ComboBox::from_id_source("video_format")
                        .selected_text(self.config.video_format.to_uppercase())
                        .show_ui(ui, |ui| {
                            for format in VideoFormat::ALL {
                                ui.selectable_value(
                                    &mut self.config.video_format,
                                    format.as_str().to_string(),
                                    format.as_str().to_uppercase(),
                                );
                            }
                        });
                    ui.end_row();

                    ui.label(egui::RichText::new("Codec:").strong());
                    egui::ComboBox::from_id_source("video_codec")
                        .selected_text(&self.config.video_codec)
                        .show_ui(ui, |ui| {
                            for codec in &codecs {
                                ui.selectable_value(&mut self.config.video_codec, codec.clone(), codec.as_str());
                            }
                        });
                    ui.end_row();

                    ui.label(egui::RichText::new("Resolution:").strong());
                    egui::ComboBox::from_id_source("resolution")
                        .selected_text(&self.config.resolution)
                        .show_ui(ui, |ui| {
                            for resolution in Resolution::ALL {
                                ui.selectable_value(
                                    &mut self.config.resolution,
                                    resolution.label().to_string(),
                                    resolution.label(),
                                );
                            }
                        });
                    ui.end_row();

                    ui.label(egui::RichText::new("Frame rate:").strong());
                    egui::ComboBox::from_id_source("frame_rate")
                        .selected_text(&self.config.frame_rate)
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut self.config.frame_rate, "Keep Original".to_string(), "Keep Original");
                            for fps in FRAME_RATES {
                                ui.selectable_value(&mut self.config.frame_rate, fps.to_string(), fps.to_string());
                            }
                        });
                    ui.end_row();
                });
            ui.checkbox(&mut self.config.hardware_acceleration, "Hardware acceleration");
            ui.checkbox(&mut self.config.join_video, "Join all files into one");
        });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if self.data.is_processing() {
                let label = if self.data.cancel_requested() { "Cancelling..." } else { "⏹ Cancel" };
                if ui
                    .add_enabled(!self.data.cancel_requested(), egui::Button::new(label))
                    .clicked()
                {
                    self.confirm_cancel = true;
                }
            } else if ui
                .add_sized([140.0, 32.0], egui::Button::new(egui::RichText::new("▶ Start").strong()))
                .clicked()
            {
                self.start_processing();
            }

            let progress = match self.data.progress_mode {
                ProgressMode::Determinate => egui::ProgressBar::new(self.data.progress / 100.0).show_percentage(),
                ProgressMode::Indeterminate => egui::ProgressBar::new(0.0).animate(true),
            };
            ui.add(progress);
        });

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(&self.data.status).color(egui::Color32::LIGHT_GRAY));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(elapsed) = self.data.elapsed() {
                    ui.label(format!("Elapsed: {:.1}s", elapsed.as_secs_f64()));
                } else if let Some(total) = self.data.last_total_time() {
                    ui.label(format!("Last job: {:.2}s", total.as_secs_f64()));
                }
            });
        });
    }

    fn show_cancel_confirmation(&mut self, ctx: &egui::Context) {
        if !self.confirm_cancel {
            return;
        }
        egui::Window::new("Cancel Processing")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Are you sure you want to cancel the current operation?");
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        self.cancel_processing();
                    }
                    if ui.button("No").clicked() {
                        self.confirm_cancel = false;
                    }
                });
            });
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.data.dialogs.front() else {
            return;
        };
        let (icon, color) = match dialog.kind {
            DialogKind::Info => ("ℹ", egui::Color32::LIGHT_BLUE),
            DialogKind::Error => ("⚠", egui::Color32::from_rgb(255, 100, 100)),
        };
        let mut dismissed = false;
        egui::Window::new(format!("{} {}", icon, dialog.title))
            .id(egui::Id::new("message_dialog"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(&dialog.message).color(color));
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.data.dialogs.pop_front();
        }
    }

    fn show_library_window(&mut self, ctx: &egui::Context) {
        if !self.show_library {
            return;
        }
        let mut open = true;
        egui::Window::new("FFmpeg Library")
            .open(&mut open)
            .default_width(520.0)
            .show(ctx, |ui| {
                egui::Grid::new("library_paths")
                    .num_columns(3)
                    .spacing([10.0, 8.0])
                    .show(ui, |ui| {
                        let paths = self.config.engine_paths();
                        let rows = [
                            ("ffmpeg", Some(paths.ffmpeg)),
                            ("ffprobe", paths.ffprobe),
                            ("ffplay", paths.ffplay),
                        ];
                        for (tool, path) in rows {
                            ui.label(egui::RichText::new(tool).strong());
                            ui.label(
                                path.map(|p| p.display().to_string())
                                    .unwrap_or_else(|| "Not found".to_string()),
                            );
                            if ui.button("Browse").clicked() {
                                self.browse_tool(tool);
                            }
                            ui.end_row();
                        }
                    });

                ui.horizontal(|ui| {
                    if ui.button("✔ Check Executables").clicked() {
                        self.check_executables();
                    }
                    if ui.button("🧪 Test Hardware Codecs").clicked() {
                        self.run_codec_test();
                    }
                    if ui.button("🌐 Download FFmpeg").clicked() {
                        self.open_download_page();
                    }
                });
                ui.separator();

                match &self.data.executable_report {
                    Some(report) => show_executable_report(ui, report),
                    None => {
                        ui.label(egui::RichText::new("Checking...").color(egui::Color32::GRAY));
                    }
                }

                if let Some(test) = &self.data.codec_test {
                    ui.separator();
                    ui.label(egui::RichText::new(&test.status_message).strong());
                    egui::Grid::new("codec_test").num_columns(2).show(ui, |ui| {
                        for (vendor, status) in [("NVIDIA", test.nvidia), ("AMD", test.amd), ("Intel", test.intel)] {
                            ui.label(vendor);
                            ui.label(egui::RichText::new(status.label()).color(status_color(status)));
                            ui.end_row();
                        }
                    });
                }
            });
        if !open {
            self.show_library = false;
        }
    }
}

fn show_executable_report(ui: &mut egui::Ui, report: &ExecutableReport) {
    egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
        ui.add(
            egui::TextEdit::multiline(&mut report.report.as_str())
                .font(egui::TextStyle::Monospace)
                .desired_width(f32::INFINITY),
        );
    });
}
