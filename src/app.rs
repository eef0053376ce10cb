use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::{egui, App};

use crate::config::Config;
use crate::llm::client::{HttpCompletionClient, TransportError};
use crate::render::{NO_QUESTIONS_WARNING, NO_TERMS_WARNING, NO_VOCABULARY_WARNING};
use crate::session::{run_song, run_topic, SessionError, SongReport, TopicReport};
use crate::types::llm_data::VocabEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Topic,
    Song,
}

/// One submission's lifecycle: nothing yet, running on a worker thread, or finished.
pub enum JobState<T> {
    Idle,
    Pending(Receiver<Result<T, SessionError>>),
    Done(Result<T, SessionError>),
}

impl<T: Send + 'static> JobState<T> {
    /// Runs `job` on a worker thread and calls `notify` once it has finished.
    pub fn spawn<F, N>(job: F, notify: N) -> Self
    where
        F: FnOnce() -> Result<T, SessionError> + Send + 'static,
        N: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // Bound before `tx` so it drops after it, even when `job` panics:
            // the repaint then always finds either a result or a disconnect.
            let _repaint = NotifyOnDrop(notify);
            let tx = tx;
            // The receiver is gone if the window closed mid-request.
            let _ = tx.send(job());
        });
        JobState::Pending(rx)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Pending(_))
    }

    /// Moves a finished job into `Done`. Returns true if the state changed.
    pub fn poll(&mut self) -> bool {
        let JobState::Pending(rx) = self else {
            return false;
        };
        match rx.try_recv() {
            Ok(result) => {
                *self = JobState::Done(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                *self = JobState::Done(Err(SessionError::Transport(TransportError::Request(
                    "worker stopped before returning a result".to_string(),
                ))));
                true
            }
        }
    }
}

struct NotifyOnDrop<N: Fn()>(N);

impl<N: Fn()> Drop for NotifyOnDrop<N> {
    fn drop(&mut self) {
        (self.0)();
    }
}

pub struct StudyWeaveApp {
    config: Config,
    config_error: Option<String>,
    api_key: String,
    model: String,
    describe_terms: bool,
    screen: Screen,
    topic_input: String,
    lyrics_input: String,
    topic_job: JobState<TopicReport>,
    song_job: JobState<SongReport>,
}

impl StudyWeaveApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: Config, config_error: Option<String>) -> Self {
        Self {
            model: config.model.clone(),
            describe_terms: config.describe_terms,
            config,
            config_error,
            api_key: String::new(),
            screen: Screen::Topic,
            topic_input: String::new(),
            lyrics_input: String::new(),
            topic_job: JobState::Idle,
            song_job: JobState::Idle,
        }
    }

    /// Client configuration for one submission. The key typed into the
    /// sidebar wins over the environment.
    fn effective_config(&self) -> Result<(Config, String), SessionError> {
        let mut config = self.config.clone();
        if !self.model.trim().is_empty() {
            config.model = self.model.trim().to_string();
        }
        config.describe_terms = self.describe_terms;
        let key = config
            .resolve_api_key(Some(self.api_key.as_str()))
            .ok_or(SessionError::Transport(TransportError::MissingCredential))?;
        Ok((config, key))
    }

    fn submit_topic(&mut self, ctx: &egui::Context) {
        if self.topic_input.trim().is_empty() {
            self.topic_job = JobState::Done(Err(SessionError::EmptyInput));
            return;
        }
        let (config, key) = match self.effective_config() {
            Ok(found) => found,
            Err(e) => {
                self.topic_job = JobState::Done(Err(e));
                return;
            }
        };
        let topic = self.topic_input.clone();
        let repaint = ctx.clone();
        tracing::info!(model = %config.model, "submitting topic");

        self.topic_job = JobState::spawn(
            move || {
                let client = HttpCompletionClient::new(config.client_config(&key))?;
                let lookup = config.describe_terms.then(|| config.lookup_options());
                run_topic(&client, &topic, lookup.as_ref())
            },
            move || repaint.request_repaint(),
        );
    }

    fn submit_song(&mut self, ctx: &egui::Context) {
        if self.lyrics_input.trim().is_empty() {
            self.song_job = JobState::Done(Err(SessionError::EmptyInput));
            return;
        }
        let (config, key) = match self.effective_config() {
            Ok(found) => found,
            Err(e) => {
                self.song_job = JobState::Done(Err(e));
                return;
            }
        };
        let lyrics = self.lyrics_input.clone();
        let repaint = ctx.clone();
        tracing::info!(model = %config.model, "submitting lyrics");

        self.song_job = JobState::spawn(
            move || {
                let client = HttpCompletionClient::new(config.client_config(&key))?;
                run_song(&client, &lyrics)
            },
            move || repaint.request_repaint(),
        );
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.separator();

        ui.label("OpenAI API key");
        ui.add(egui::TextEdit::singleline(&mut self.api_key).password(true));
        ui.small(format!("Falls back to ${} when empty.", self.config.api_key_env));
        ui.add_space(5.0);

        ui.label("Model");
        ui.text_edit_singleline(&mut self.model);
        ui.add_space(5.0);

        ui.checkbox(&mut self.describe_terms, "Look up each technical term");
        ui.separator();

        ui.collapsing("Configuration", |ui| {
            if let Some(err) = &self.config_error {
                ui.colored_label(egui::Color32::RED, format!("Config: {}", err));
                ui.label("Using built-in defaults.");
            } else {
                ui.colored_label(egui::Color32::GREEN, format!("Endpoint: {}", self.config.endpoint));
                ui.label(format!("Timeout: {}s", self.config.timeout_secs));
                ui.label(format!(
                    "Term lookups: {} at a time, {} ms apart",
                    self.config.term_concurrency, self.config.min_request_interval_ms
                ));
            }
        });
    }

    fn topic_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Topic-Based Question Generator");
        ui.label("Enter a topic, and AI will generate questions, answers, and extract technical terms with descriptions for you.");
        ui.add_space(5.0);

        ui.label("Enter the topic here:");
        ui.add(
            egui::TextEdit::multiline(&mut self.topic_input)
                .hint_text("Your topic here")
                .desired_rows(4)
                .desired_width(f32::INFINITY),
        );

        let pending = self.topic_job.is_pending();
        ui.horizontal(|ui| {
            let button = egui::Button::new("Generate Questions, Answers, and Technical Terms with Descriptions");
            if ui.add_enabled(!pending, button).clicked() {
                self.submit_topic(ui.ctx());
            }
            if pending {
                ui.spinner();
            }
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .id_source("topic_output_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| match &self.topic_job {
                JobState::Done(Ok(report)) => show_topic_report(ui, report),
                JobState::Done(Err(err)) => show_error(ui, err),
                JobState::Pending(_) => {
                    ui.label("Waiting for the model...");
                }
                JobState::Idle => {}
            });
    }

    fn song_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Japanese Song Vocabulary Extractor and Translator");
        ui.label("Input the lyrics of a Japanese song, and the AI will extract the song title, translate the lyrics into English, and extract interesting vocabulary with their translations and synonyms.");
        ui.add_space(5.0);

        ui.label("Enter the song lyrics here:");
        ui.add(
            egui::TextEdit::multiline(&mut self.lyrics_input)
                .hint_text("Your lyrics here")
                .desired_rows(8)
                .desired_width(f32::INFINITY),
        );

        let pending = self.song_job.is_pending();
        ui.horizontal(|ui| {
            if ui.add_enabled(!pending, egui::Button::new("Submit")).clicked() {
                self.submit_song(ui.ctx());
            }
            if pending {
                ui.spinner();
            }
        });
        ui.separator();

        egui::ScrollArea::both()
            .id_source("song_output_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| match &self.song_job {
                JobState::Done(Ok(report)) => show_song_report(ui, report),
                JobState::Done(Err(err)) => show_error(ui, err),
                JobState::Pending(_) => {
                    ui.label("Waiting for the model...");
                }
                JobState::Idle => {}
            });
    }
}

impl App for StudyWeaveApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.topic_job.poll();
        self.song_job.poll();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.separator();
                ui.selectable_value(&mut self.screen, Screen::Topic, "Topic Q&A");
                ui.selectable_value(&mut self.screen, Screen::Song, "Song Translation");
            });
        });

        egui::SidePanel::left("side_panel_left")
            .min_width(220.0)
            .default_width(280.0)
            .show(ctx, |ui| self.side_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Topic => self.topic_screen(ui),
            Screen::Song => self.song_screen(ui),
        });
    }
}

fn show_raw_response(ui: &mut egui::Ui, raw: &str) {
    ui.collapsing("AI Response (Raw)", |ui| {
        let mut s_display = raw.to_string();
        ui.add(
            egui::TextEdit::multiline(&mut s_display)
                .font(egui::TextStyle::Monospace)
                .desired_width(f32::INFINITY)
                .interactive(false)
                .frame(true),
        );
    });
}

fn show_topic_report(ui: &mut egui::Ui, report: &TopicReport) {
    show_raw_response(ui, &report.raw_text);

    let topic = &report.result;
    if !topic.has_questions_and_answers() {
        ui.colored_label(egui::Color32::YELLOW, NO_QUESTIONS_WARNING);
        return;
    }

    ui.heading("Questions:");
    for (idx, question) in topic.questions.iter().enumerate() {
        ui.label(format!("Q{}: {}", idx + 1, question));
    }
    ui.add_space(5.0);
    ui.heading("Answers:");
    for (idx, answer) in topic.answers.iter().enumerate() {
        ui.label(format!("A{}: {}", idx + 1, answer));
    }
    ui.add_space(5.0);

    let rows = report.term_rows();
    if rows.is_empty() {
        ui.colored_label(egui::Color32::YELLOW, NO_TERMS_WARNING);
        return;
    }
    ui.heading("Technical Terms with Descriptions:");
    egui::Grid::new("technical_terms_grid")
        .striped(true)
        .num_columns(2)
        .show(ui, |ui| {
            ui.strong("Technical Term");
            ui.strong("Description");
            ui.end_row();
            for (term, description) in &rows {
                ui.label(term);
                ui.label(description);
                ui.end_row();
            }
        });
}

fn show_song_report(ui: &mut egui::Ui, report: &SongReport) {
    show_raw_response(ui, &report.raw_text);

    let song = &report.result;
    ui.label(egui::RichText::new(format!("Song Title: {}", song.song_title)).strong());
    ui.label(format!("English Translation: {}", song.song_translation));
    ui.add_space(5.0);

    if song.vocabulary.is_empty() {
        ui.colored_label(egui::Color32::YELLOW, NO_VOCABULARY_WARNING);
        return;
    }
    egui::Grid::new("vocabulary_grid")
        .striped(true)
        .num_columns(VocabEntry::COLUMNS.len())
        .show(ui, |ui| {
            for column in VocabEntry::COLUMNS {
                ui.strong(column);
            }
            ui.end_row();
            for entry in &song.vocabulary {
                for cell in entry.cells() {
                    ui.label(cell);
                }
                ui.end_row();
            }
        });
}

fn show_error(ui: &mut egui::Ui, err: &SessionError) {
    ui.colored_label(egui::Color32::RED, err.to_string());
    if let Some(raw) = err.raw_text() {
        ui.add_space(5.0);
        ui.label("Raw response:");
        let mut s_display = raw.to_string();
        ui.add(
            egui::TextEdit::multiline(&mut s_display)
                .font(egui::TextStyle::Monospace)
                .desired_width(f32::INFINITY)
                .interactive(false)
                .frame(true),
        );
    }
}
