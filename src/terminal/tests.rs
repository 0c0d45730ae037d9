#[cfg(test)]
mod tests {
    use crate::error::Result;
    use crate::events::{ClientEvent, SessionEvent};
    use crate::fleet::Fleet;
    use crate::terminal::bridge::SessionBridge;
    use crate::terminal::channel::{ChannelState, CommandChannel};
    use crate::terminal::link::{PtyEvent, PtyLink, PtyOpener};
    use crate::terminal::registry::SessionRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Scripted stand-in for the remote side of a PTY channel
    struct FakeLink {
        remote_rx: mpsc::UnboundedReceiver<PtyEvent>,
        sent_tx: mpsc::UnboundedSender<Vec<u8>>,
        resize_tx: mpsc::UnboundedSender<(u32, u32)>,
        closed: Arc<AtomicBool>,
    }

    /// Test-side handle driving a `FakeLink`
    struct FakeRemote {
        event_tx: mpsc::UnboundedSender<PtyEvent>,
        sent_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        resize_rx: mpsc::UnboundedReceiver<(u32, u32)>,
        closed: Arc<AtomicBool>,
    }

    fn fake_link() -> (FakeLink, FakeRemote) {
        let (event_tx, remote_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (resize_tx, resize_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            FakeLink {
                remote_rx,
                sent_tx,
                resize_tx,
                closed: Arc::clone(&closed),
            },
            FakeRemote {
                event_tx,
                sent_rx,
                resize_rx,
                closed,
            },
        )
    }

    #[async_trait]
    impl PtyLink for FakeLink {
        async fn next_event(&mut self) -> Option<PtyEvent> {
            self.remote_rx.recv().await
        }

        async fn send(&mut self, data: &[u8]) -> Result<()> {
            let _ = self.sent_tx.send(data.to_vec());
            Ok(())
        }

        async fn resize(&mut self, rows: u32, cols: u32) -> Result<()> {
            let _ = self.resize_tx.send((rows, cols));
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    /// Opener handing out fake links while recording requested geometry
    #[derive(Default)]
    struct FakeOpener {
        opened: Mutex<Vec<(u32, u32)>>,
        remotes: Mutex<Vec<FakeRemote>>,
    }

    impl FakeOpener {
        fn take_remote(&self) -> FakeRemote {
            self.remotes.lock().unwrap().remove(0)
        }

        fn opened(&self) -> Vec<(u32, u32)> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PtyOpener for FakeOpener {
        async fn open_pty(&self, rows: u32, cols: u32) -> Result<Box<dyn PtyLink>> {
            let (link, remote) = fake_link();
            self.opened.lock().unwrap().push((rows, cols));
            self.remotes.lock().unwrap().push(remote);
            Ok(Box::new(link))
        }
    }

    /// Opener whose PTY allocation always fails
    struct BrokenOpener;

    #[async_trait]
    impl PtyOpener for BrokenOpener {
        async fn open_pty(&self, _rows: u32, _cols: u32) -> Result<Box<dyn PtyLink>> {
            Err(anyhow::anyhow!("no transport"))
        }
    }

    fn events() -> (
        mpsc::UnboundedSender<SessionEvent>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_command_is_wrapped_and_sent_after_settle() {
        let (link, mut remote) = fake_link();
        let (events_tx, _events_rx) = events();
        let channel = CommandChannel::spawn(Box::new(link), "echo", "hi", 24, 80, events_tx);

        assert_eq!(channel.state(), ChannelState::Opening);

        let sent = remote.sent_rx.recv().await.expect("command must be sent");
        let sent = String::from_utf8(sent).unwrap();
        assert_eq!(sent, "trap 'exit' INT; echo hi; exit\n");

        let mut watch = channel.state_watch();
        watch
            .wait_for(|state| *state == ChannelState::Running)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_echo_command_emits_output_then_clean_completion() {
        let (link, mut remote) = fake_link();
        let (events_tx, mut events_rx) = events();
        let _channel = CommandChannel::spawn(Box::new(link), "echo", "hi", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        remote
            .event_tx
            .send(PtyEvent::Output(b"hi\r\n".to_vec()))
            .unwrap();
        remote.event_tx.send(PtyEvent::Exited(0)).unwrap();

        match events_rx.recv().await.unwrap() {
            SessionEvent::PtyOutput { output } => assert!(output.contains("hi")),
            other => panic!("expected pty output, got {:?}", other),
        }
        match events_rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.is_empty()),
            other => panic!("expected task_finished, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_banner_noise_is_never_forwarded() {
        let (link, mut remote) = fake_link();
        // banner queued before the channel even starts
        remote
            .event_tx
            .send(PtyEvent::Output(b"Welcome to alpha\r\n$ ".to_vec()))
            .unwrap();

        let (events_tx, mut events_rx) = events();
        let _channel = CommandChannel::spawn(Box::new(link), "echo", "hi", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        remote
            .event_tx
            .send(PtyEvent::Output(b"hi\r\n".to_vec()))
            .unwrap();

        match events_rx.recv().await.unwrap() {
            SessionEvent::PtyOutput { output } => {
                assert!(!output.contains("Welcome"));
                assert!(output.contains("hi"));
            }
            other => panic!("expected pty output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_while_running_cancels_then_closes_in_order() {
        let (link, mut remote) = fake_link();
        let (events_tx, mut events_rx) = events();
        let channel = CommandChannel::spawn(Box::new(link), "journalctl", "-f", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        remote
            .event_tx
            .send(PtyEvent::Output(b"tick\r\n".to_vec()))
            .unwrap();
        match events_rx.recv().await.unwrap() {
            SessionEvent::PtyOutput { output } => assert!(output.contains("tick")),
            other => panic!("expected pty output, got {:?}", other),
        }

        channel.close().await;

        match events_rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.contains("cancelled")),
            other => panic!("expected task_finished, got {:?}", other),
        }
        assert_eq!(events_rx.recv().await.unwrap(), SessionEvent::ChannelClosed);
        assert!(remote.closed.load(Ordering::SeqCst));

        // output produced after close is never forwarded
        let _ = remote.event_tx.send(PtyEvent::Output(b"late\r\n".to_vec()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_input_reaches_remote_while_running() {
        let (link, mut remote) = fake_link();
        let (events_tx, _events_rx) = events();
        let channel = CommandChannel::spawn(Box::new(link), "htop", "", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        channel.send_input(b"q");

        let forwarded = remote.sent_rx.recv().await.unwrap();
        assert_eq!(forwarded, b"q".to_vec());
    }

    #[tokio::test]
    async fn test_input_after_completion_is_dropped() {
        let (link, mut remote) = fake_link();
        let (events_tx, mut events_rx) = events();
        let channel = CommandChannel::spawn(Box::new(link), "true", "", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        remote.event_tx.send(PtyEvent::Exited(0)).unwrap();
        match events_rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.is_empty()),
            other => panic!("expected task_finished, got {:?}", other),
        }

        assert_eq!(channel.state(), ChannelState::Finished);
        channel.send_input(b"ignored");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(remote.sent_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_live_resize_is_forwarded() {
        let (link, mut remote) = fake_link();
        let (events_tx, _events_rx) = events();
        let mut channel = CommandChannel::spawn(Box::new(link), "htop", "", 24, 80, events_tx);

        remote.sent_rx.recv().await.expect("command must be sent");
        let mut watch = channel.state_watch();
        watch
            .wait_for(|state| *state == ChannelState::Running)
            .await
            .unwrap();

        channel.resize(50, 132);
        assert_eq!(remote.resize_rx.recv().await.unwrap(), (50, 132));
        assert_eq!(channel.rows(), 50);
        assert_eq!(channel.cols(), 132);
    }

    #[tokio::test]
    async fn test_bridge_stores_geometry_before_any_channel_exists() {
        let (events_tx, _events_rx) = events();
        let mut bridge = SessionBridge::new(events_tx);
        let opener = FakeOpener::default();

        bridge.resize(Some(40), Some(100));
        assert!(!bridge.has_channel());

        bridge.open_with_command(&opener, "htop", "").await;
        assert_eq!(opener.opened(), vec![(40, 100)]);
    }

    #[tokio::test]
    async fn test_bridge_supersession_leaves_exactly_one_live_channel() {
        let (events_tx, mut events_rx) = events();
        let mut bridge = SessionBridge::new(events_tx);
        let opener = FakeOpener::default();

        bridge.open_with_command(&opener, "journalctl", "-f").await;
        let mut first_remote = opener.take_remote();
        first_remote
            .sent_rx
            .recv()
            .await
            .expect("first command must be sent");
        let mut first_watch = bridge.channel().unwrap().state_watch();

        bridge.open_with_command(&opener, "echo", "hi").await;

        // the first channel reached a terminal state before the second ran
        assert!(first_watch.borrow_and_update().is_terminal());
        assert!(first_remote.closed.load(Ordering::SeqCst));
        assert!(bridge.has_channel());
        assert_eq!(opener.opened().len(), 2);

        match events_rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.contains("cancelled")),
            other => panic!("expected task_finished, got {:?}", other),
        }
        assert_eq!(events_rx.recv().await.unwrap(), SessionEvent::ChannelClosed);
    }

    #[tokio::test]
    async fn test_bridge_reuses_sticky_geometry_across_recreation() {
        let (events_tx, _events_rx) = events();
        let mut bridge = SessionBridge::new(events_tx);
        let opener = FakeOpener::default();

        bridge.resize(Some(40), None);
        bridge.open_with_command(&opener, "htop", "").await;
        bridge.open_with_command(&opener, "htop", "").await;

        assert_eq!(opener.opened(), vec![(40, 80), (40, 80)]);
    }

    #[tokio::test]
    async fn test_bridge_reports_open_failure_as_finished_task() {
        let (events_tx, mut events_rx) = events();
        let mut bridge = SessionBridge::new(events_tx);

        bridge.open_with_command(&BrokenOpener, "echo", "hi").await;

        assert!(!bridge.has_channel());
        match events_rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.contains("no transport")),
            other => panic!("expected task_finished, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bridge_close_clears_channel() {
        let (events_tx, _events_rx) = events();
        let mut bridge = SessionBridge::new(events_tx);
        let opener = FakeOpener::default();

        bridge.open_with_command(&opener, "htop", "").await;
        assert!(bridge.has_channel());

        bridge.close().await;
        assert!(!bridge.has_channel());
        assert!(opener.take_remote().closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_registry_event_for_unknown_client_is_noop() {
        let fleet = Arc::new(Fleet::from_config(&[]));
        let registry = SessionRegistry::new(fleet);

        registry
            .handle_event(
                "ghost",
                ClientEvent::PtyInput {
                    input: "x".to_string(),
                },
            )
            .await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_registry_lifecycle_and_unknown_host_report() {
        let fleet = Arc::new(Fleet::from_config(&[]));
        let registry = SessionRegistry::new(fleet);
        let (tx, mut rx) = mpsc::unbounded_channel();

        registry.connect("c1", tx).await;
        assert_eq!(registry.session_count().await, 1);

        registry
            .handle_event(
                "c1",
                ClientEvent::StartCommand {
                    hostname: "nowhere".to_string(),
                    username: String::new(),
                    cmd: "echo".to_string(),
                    cmd_args: "hi".to_string(),
                },
            )
            .await;
        match rx.recv().await.unwrap() {
            SessionEvent::TaskFinished { reason } => assert!(reason.contains("nowhere")),
            other => panic!("expected task_finished, got {:?}", other),
        }

        registry.disconnect("c1").await;
        assert_eq!(registry.session_count().await, 0);
    }
}
