use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::warn;
use trajan::engine::progress::{Progress, ProgressCallback};

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

/// Phases nest (a build contains one averaging and one measuring phase per
/// stream) while a task spans the phases of one stream, so the two are
/// tracked separately.
#[derive(Default)]
struct BarState {
    phases: Vec<&'static str>,
    spinner: Option<ProgressBar>,
    task_bar: Option<ProgressBar>,
}

impl BarState {
    fn label(&self) -> String {
        self.phases.join(" › ")
    }
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        self.clear_bars();
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.state.phases.push(name);
                let label = self.state.label();
                if let Some(bar) = self.state.task_bar.as_ref() {
                    bar.set_message(label);
                    return;
                }
                if let Some(spinner) = self.state.spinner.take() {
                    spinner.finish_and_clear();
                }
                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_style(Self::spinner_style());
                pb.set_message(label);
                self.state.spinner = Some(pb);
            }
            Progress::PhaseFinish => {
                let Some(name) = self.state.phases.pop() else {
                    return;
                };
                self.mp.println(format!("✓ {}", name)).ok();

                let label = self.state.label();
                if let Some(bar) = self.state.task_bar.as_ref() {
                    bar.set_message(label);
                } else if self.state.phases.is_empty() {
                    if let Some(spinner) = self.state.spinner.take() {
                        spinner.finish_and_clear();
                    }
                } else if let Some(spinner) = self.state.spinner.as_ref() {
                    spinner.set_message(label);
                }
            }
            Progress::TaskStart { total_steps } => {
                if let Some(spinner) = self.state.spinner.take() {
                    spinner.finish_and_clear();
                }
                if let Some(bar) = self.state.task_bar.take() {
                    bar.finish_and_clear();
                }
                let pb = self.mp.add(ProgressBar::new(total_steps));
                pb.set_style(Self::bar_style());
                pb.set_message(self.state.label());
                self.state.task_bar = Some(pb);
            }
            Progress::TaskIncrement { amount } => {
                if let Some(bar) = self.state.task_bar.as_ref() {
                    bar.inc(amount);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = self.state.task_bar.take() {
                    bar.finish_and_clear();
                }
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
        }
    }

    fn clear_bars(&mut self) {
        if let Some(bar) = self.state.task_bar.take() {
            bar.finish_and_clear();
        }
        if let Some(spinner) = self.state.spinner.take() {
            spinner.finish_and_clear();
        }
        self.state.phases.clear();
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<30} [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")
            .expect("Invalid template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn setup_manager() -> (UiManager, mpsc::Sender<UiEvent>) {
        let (manager, sender, _) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        (manager, sender)
    }

    fn send(manager: &mut UiManager, progress: Progress) {
        manager.handle_event(UiEvent::Progress(progress));
    }

    #[test]
    fn handle_phase_start_creates_new_spinner() {
        let (mut manager, _) = setup_manager();
        assert!(manager.state.spinner.is_none());

        send(&mut manager, Progress::PhaseStart { name: "Build" });

        let spinner = manager.state.spinner.as_ref().unwrap();
        assert_eq!(spinner.message(), "Build");
        assert_eq!(manager.state.phases, vec!["Build"]);
    }

    #[test]
    fn nested_phases_extend_the_label() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::PhaseStart { name: "Build" });
        send(&mut manager, Progress::PhaseStart { name: "Measuring" });

        assert_eq!(
            manager.state.spinner.as_ref().unwrap().message(),
            "Build › Measuring"
        );

        send(&mut manager, Progress::PhaseFinish);
        assert_eq!(manager.state.spinner.as_ref().unwrap().message(), "Build");
    }

    #[test]
    fn finishing_the_outermost_phase_clears_the_spinner() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::PhaseStart { name: "Preparation" });
        send(&mut manager, Progress::PhaseFinish);

        assert!(manager.state.spinner.is_none());
        assert!(manager.state.phases.is_empty());
    }

    #[test]
    fn unmatched_phase_finish_is_ignored() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::PhaseFinish);
        assert!(manager.state.phases.is_empty());
    }

    #[test]
    fn task_bar_spans_the_phases_of_a_stream() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::PhaseStart { name: "Build" });
        send(&mut manager, Progress::TaskStart { total_steps: 20 });
        assert!(manager.state.spinner.is_none());

        send(&mut manager, Progress::PhaseStart { name: "Averaging" });
        send(&mut manager, Progress::TaskIncrement { amount: 10 });
        send(&mut manager, Progress::PhaseFinish);
        send(&mut manager, Progress::PhaseStart { name: "Measuring" });
        send(&mut manager, Progress::TaskIncrement { amount: 4 });

        let bar = manager.state.task_bar.as_ref().unwrap();
        assert_eq!(bar.length(), Some(20));
        assert_eq!(bar.position(), 14);
        assert_eq!(bar.message(), "Build › Measuring");
    }

    #[test]
    fn handle_task_finish_drops_the_bar() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::PhaseStart { name: "Build" });
        send(&mut manager, Progress::TaskStart { total_steps: 5 });

        send(&mut manager, Progress::TaskFinish);

        assert!(manager.state.task_bar.is_none());
        assert_eq!(manager.state.phases, vec!["Build"]);
    }

    #[test]
    fn increments_without_a_task_are_ignored() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::TaskIncrement { amount: 3 });
        assert!(manager.state.task_bar.is_none());
    }

    #[tokio::test]
    async fn cli_progress_handler_sends_progress_event() {
        let (sender, mut receiver) = mpsc::channel(1);
        let handler = CliProgressHandler::new(sender);
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Testing" });

        let event = receiver.recv().await.unwrap();
        match event {
            UiEvent::Progress(Progress::PhaseStart { name }) => assert_eq!(name, "Testing"),
            other => panic!("Incorrect event received: {:?}", other),
        }
    }

    #[test]
    fn handle_log_event_prints_message() {
        let (mut manager, _) = setup_manager();
        manager.handle_event(UiEvent::Log("Test log message".to_string()));
    }

    #[test]
    fn handle_progress_message_prints_indented_message() {
        let (mut manager, _) = setup_manager();
        send(&mut manager, Progress::Message("Stream 'traj'".to_string()));
    }
}
