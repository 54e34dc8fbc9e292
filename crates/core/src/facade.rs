// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

//! Launcher session
//!
//! The one object a front end talks to. It owns the property graph, the
//! stream multiplexer and the lifecycle controller, and turns user actions
//! into unary calls and lifecycle operations.

use std::env;
use std::sync::Arc;

use tracing::{error, info, warn};

use tunnel_launcher_common::{
    LauncherConfig, LauncherSettings, NodeInfo, NotificationMode, RpcError, RpcRequest,
    RpcResponse, ServiceConfig, SettingsStore, Tunnel, TunnelAction, TunnelUpdate, UpdateStatus,
    UserInfo, UPDATE_INTERVAL_DAILY, UPDATE_INTERVAL_DISABLED,
};

use crate::dispatcher::Dispatcher;
use crate::error::LauncherError;
use crate::events::{LogSink, UserPrompt};
use crate::graph::{PropertyGraph, PropertyValue};
use crate::lifecycle::{DaemonMode, LifecycleController, LifecycleError};
use crate::multiplexer::{LoopState, StreamMultiplexer};
use crate::properties::*;
use crate::transport::Transport;
use crate::view_models::TunnelView;

const REMOTE_SESSION_WARNING: &str = "This launcher appears to run inside a remote session. \
     The daemon stops during the update and remote tunnels may drop, which can cut your connection.";

/// Why the front end has to terminate the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRequired {
    /// The daemon now runs in this mode; the launcher cannot follow it in place
    ModeSwitched(DaemonMode),
    /// The switch failed; the daemon was put back in its previous mode
    ModeSwitchFailed,
    /// The updater has taken over
    UpdateHandoff,
}

pub struct LauncherSession {
    config: LauncherConfig,
    graph: Arc<PropertyGraph>,
    multiplexer: StreamMultiplexer,
    lifecycle: Arc<LifecycleController>,
    settings_store: Arc<dyn SettingsStore>,
}

impl LauncherSession {
    pub fn new(
        config: LauncherConfig,
        transport: Arc<dyn Transport>,
        lifecycle: Arc<LifecycleController>,
        dispatcher: Arc<dyn Dispatcher>,
        log_sink: Arc<dyn LogSink>,
        settings_store: Arc<dyn SettingsStore>,
    ) -> Result<Self, LauncherError> {
        let settings = settings_store.load().unwrap_or_else(|e| {
            warn!("Failed to load launcher settings, using defaults: {}", e);
            LauncherSettings::default()
        });

        let graph = Arc::new(PropertyGraph::new(dispatcher));
        declare_session(&graph)?;
        declare_launcher(&graph, &settings, lifecycle.mode())?;

        let multiplexer = StreamMultiplexer::new(
            transport,
            graph.clone(),
            log_sink,
            config.connect_timeout(),
            config.backoff(),
        );

        Ok(Self {
            config,
            graph,
            multiplexer,
            lifecycle,
            settings_store,
        })
    }

    /// Make sure a daemon runs, then start streaming from it
    pub async fn start(&self) -> Result<(), LauncherError> {
        self.lifecycle.ensure_running().await?;
        self.multiplexer.start();
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.multiplexer.stop(true).await;
    }

    pub fn graph(&self) -> &Arc<PropertyGraph> {
        &self.graph
    }

    pub fn loop_state(&self) -> LoopState {
        self.multiplexer.state()
    }

    fn read<T: PropertyValue + Clone + Default>(&self, name: &str) -> T {
        self.graph.get::<T>(name).unwrap_or_else(|e| {
            error!("Failed to read {}: {}", name, e);
            T::default()
        })
    }

    pub fn connected(&self) -> bool {
        self.read(CONNECTED)
    }

    pub fn user_info(&self) -> UserInfo {
        self.read(USER_INFO)
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.read(NODES)
    }

    pub fn creatable_nodes(&self) -> Vec<NodeInfo> {
        self.read(CREATABLE_NODES)
    }

    pub fn tunnel_views(&self) -> Vec<TunnelView> {
        self.read(TUNNEL_VIEWS)
    }

    pub fn logged_in(&self) -> bool {
        self.read(LOGGED_IN)
    }

    pub fn logging_in(&self) -> bool {
        self.read(LOGGING_IN)
    }

    pub fn token_editable(&self) -> bool {
        self.read(TOKEN_EDITABLE)
    }

    pub fn user_token_display(&self) -> String {
        self.read(USER_TOKEN_DISPLAY)
    }

    pub fn have_update(&self) -> bool {
        self.read(HAVE_UPDATE)
    }

    pub fn update_text(&self) -> String {
        self.read(UPDATE_TEXT)
    }

    pub fn check_update(&self) -> bool {
        self.read(CHECK_UPDATE)
    }

    pub fn can_enable_remote_management(&self) -> bool {
        self.read(CAN_ENABLE_REMOTE_MANAGEMENT)
    }

    pub fn working_mode(&self) -> String {
        self.read(WORKING_MODE)
    }

    pub fn daemon_mode(&self) -> DaemonMode {
        self.lifecycle.mode()
    }

    pub fn set_user_token(&self, token: impl Into<String>) -> Result<(), LauncherError> {
        self.graph.set(USER_TOKEN, token.into())?;
        Ok(())
    }

    /// Log out when logged in, otherwise log in with the entered token.
    /// The logging-in flag is held for the duration of the call.
    pub async fn login_or_logout(&self) -> Result<(), LauncherError> {
        let request = if self.logged_in() {
            RpcRequest::Logout
        } else {
            RpcRequest::Login {
                token: self.graph.get::<String>(USER_TOKEN)?,
            }
        };

        self.graph.set(LOGGING_IN_FLAG, true)?;
        let result = self.multiplexer.call(request).await;
        self.graph.set(LOGGING_IN_FLAG, false)?;
        result?;
        Ok(())
    }

    /// Fetch the tunnel list and replace the local copy
    pub async fn reload_tunnels(&self) -> Result<Vec<Tunnel>, LauncherError> {
        match self.multiplexer.call(RpcRequest::ReloadTunnels).await? {
            RpcResponse::Tunnels(tunnels) => {
                self.graph.set(TUNNELS, tunnels.clone())?;
                Ok(tunnels)
            }
            RpcResponse::Ack => Err(RpcError::Protocol("reload returned no tunnel list".to_string()).into()),
        }
    }

    /// The list is not touched locally; the next reload shows the daemon's view
    pub async fn set_tunnel_enabled(&self, id: u32, enabled: bool) -> Result<(), LauncherError> {
        let tunnel = Tunnel {
            id,
            enabled,
            ..Default::default()
        };
        self.update_tunnel(TunnelAction::Update, tunnel).await
    }

    pub async fn delete_tunnel(&self, id: u32) -> Result<(), LauncherError> {
        let tunnel = Tunnel {
            id,
            ..Default::default()
        };
        self.update_tunnel(TunnelAction::Delete, tunnel).await
    }

    /// Ask the daemon to create a tunnel. Daemons without tunnel creation reject it.
    pub async fn create_tunnel(&self, tunnel: Tunnel) -> Result<(), LauncherError> {
        self.update_tunnel(TunnelAction::Create, tunnel).await
    }

    async fn update_tunnel(&self, action: TunnelAction, tunnel: Tunnel) -> Result<(), LauncherError> {
        let request = RpcRequest::UpdateTunnel(TunnelUpdate { action, tunnel });
        self.multiplexer.call(request).await?;
        Ok(())
    }

    /// Entry point for whatever fetches the daemon's configuration
    pub fn set_service_config(&self, config: Option<ServiceConfig>) -> Result<(), LauncherError> {
        self.graph.set_if_changed(CONFIG, config)?;
        Ok(())
    }

    /// Entry point for the update checker
    pub fn set_update(&self, update: Option<UpdateStatus>) -> Result<(), LauncherError> {
        self.graph.set_if_changed(UPDATE, update)?;
        Ok(())
    }

    pub async fn set_bypass_proxy(&self, value: bool) -> Result<(), LauncherError> {
        self.edit_config(|c| c.bypass_proxy = value).await
    }

    pub async fn set_enable_tls(&self, value: bool) -> Result<(), LauncherError> {
        self.edit_config(|c| c.frpc_force_tls = value).await
    }

    /// Enabling needs a management key; without one the flag stays off
    pub async fn set_remote_management(&self, value: bool) -> Result<(), LauncherError> {
        self.edit_config(|c| {
            if !value || !c.remote_management_key.is_empty() {
                c.remote_management = value;
            } else {
                warn!("Remote management needs a management key");
            }
        })
        .await
    }

    pub async fn set_check_update(&self, value: bool) -> Result<(), LauncherError> {
        self.edit_config(|c| {
            c.update_interval = if value {
                UPDATE_INTERVAL_DAILY
            } else {
                UPDATE_INTERVAL_DISABLED
            };
        })
        .await?;
        if !value {
            self.graph.set(UPDATE, None::<UpdateStatus>)?;
        }
        Ok(())
    }

    /// Edit a copy of the config, publish it, then push it to the daemon.
    /// Without a config there is nothing to edit.
    async fn edit_config<F>(&self, edit: F) -> Result<(), LauncherError>
    where
        F: FnOnce(&mut ServiceConfig),
    {
        let Some(mut config) = self.graph.get::<Option<ServiceConfig>>(CONFIG)? else {
            return Ok(());
        };
        edit(&mut config);
        self.graph.set(CONFIG, Some(config.clone()))?;
        self.multiplexer.call(RpcRequest::PushServiceConfig(config)).await?;
        Ok(())
    }

    pub fn notification_mode(&self) -> NotificationMode {
        self.read(NOTIFICATION_MODE)
    }

    pub fn log_text_wrapping(&self) -> bool {
        self.read(LOG_TEXT_WRAPPING)
    }

    pub fn set_notification_mode(&self, mode: NotificationMode) -> Result<(), LauncherError> {
        if self.graph.set_if_changed(NOTIFICATION_MODE, mode)? {
            self.save_settings()?;
        }
        Ok(())
    }

    pub fn set_log_text_wrapping(&self, wrap: bool) -> Result<(), LauncherError> {
        if self.graph.set_if_changed(LOG_TEXT_WRAPPING, wrap)? {
            self.save_settings()?;
        }
        Ok(())
    }

    fn save_settings(&self) -> Result<(), LauncherError> {
        let settings = LauncherSettings {
            notification_mode: self.notification_mode(),
            log_text_wrapping: self.log_text_wrapping(),
        };
        self.settings_store.save(&settings)?;
        Ok(())
    }

    /// Move the daemon to the other working mode after confirmation.
    ///
    /// `Ok(None)` means the user declined. Once the switch has been attempted
    /// the caller must exit, whether it succeeded or not.
    pub async fn switch_working_mode(&self, prompt: &dyn UserPrompt) -> Result<Option<ExitRequired>, LauncherError> {
        if self.read::<bool>(SWITCHING_MODE) || self.lifecycle.is_switching() {
            return Err(LifecycleError::SwitchInProgress.into());
        }
        if self.logging_in() || self.logged_in() {
            let err = LifecycleError::PreconditionFailed(
                "Log out of the current account before switching the working mode".to_string(),
            );
            prompt.warn(&err.to_string());
            return Err(err.into());
        }

        let target = self.lifecycle.mode().other();
        let question = match target {
            DaemonMode::ManagedService => {
                "Install the daemon as a system service? Tunnels then keep running without the launcher. \
                 The launcher exits after the switch."
            }
            DaemonMode::Unmanaged => {
                "Uninstall the system service and run the daemon with the launcher? \
                 The launcher exits after the switch."
            }
        };
        if !prompt.confirm(question) {
            return Ok(None);
        }

        self.graph.set(SWITCHING_MODE, true)?;
        let auth_in_flight = self.logging_in() || self.logged_in();
        let result = self.lifecycle.switch_mode(target, auth_in_flight).await;
        self.graph.set(SWITCHING_MODE, false)?;

        match result {
            Ok(()) => {
                self.graph.set(DAEMON_MODE, target)?;
                info!("Working mode switched to {}", target);
                prompt.report(&format!(
                    "The daemon now runs as: {}. The launcher will exit, start it again.",
                    target
                ));
                Ok(Some(ExitRequired::ModeSwitched(target)))
            }
            Err(err) => {
                error!("Working mode switch failed: {}", err);
                prompt.report(&format!(
                    "Failed to switch the working mode: {}. The launcher will exit, start it again.",
                    err
                ));
                Ok(Some(ExitRequired::ModeSwitchFailed))
            }
        }
    }

    /// Hand over to a downloaded update after confirmation.
    ///
    /// Once confirmed the caller must exit, even if the updater failed to launch.
    pub async fn confirm_update(&self, prompt: &dyn UserPrompt) -> Result<Option<ExitRequired>, LauncherError> {
        let Some(update) = self
            .graph
            .get::<Option<UpdateStatus>>(UPDATE)?
            .filter(|u| !u.update_ready_dir.is_empty())
        else {
            return Ok(None);
        };

        if !prompt.confirm(&format!("Install the downloaded update?\n\n{}", update.note)) {
            return Ok(None);
        }
        if is_remote_session() {
            prompt.warn(REMOTE_SESSION_WARNING);
            if !prompt.confirm("Continue with the update anyway?") {
                return Ok(None);
            }
        }

        if let Err(e) = self
            .lifecycle
            .hand_off_update(&update.update_ready_dir, &self.config.ui_flavor)
            .await
        {
            error!("Failed to launch the updater: {}", e);
            prompt.report(&format!("Failed to launch the updater: {}", e));
        }
        Ok(Some(ExitRequired::UpdateHandoff))
    }
}

fn is_remote_session() -> bool {
    env::var_os("SSH_CONNECTION").is_some() || env::var_os("SSH_TTY").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::OwnerThread;
    use crate::events::testing::{RecordingSink, ScriptedPrompt};
    use crate::lifecycle::testing::RecordingBackend;
    use crate::transport::mock::MockTransport;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::time::Duration;
    use tunnel_launcher_common::{NodeList, StreamMessage, UserStatus};

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Option<LauncherSettings>>,
    }

    impl SettingsStore for MemoryStore {
        fn load(&self) -> tunnel_launcher_common::Result<LauncherSettings> {
            Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
        }

        fn save(&self, settings: &LauncherSettings) -> tunnel_launcher_common::Result<()> {
            *self.saved.lock().unwrap() = Some(settings.clone());
            Ok(())
        }
    }

    struct Harness {
        transport: MockTransport,
        backend: Arc<RecordingBackend>,
        store: Arc<MemoryStore>,
        session: LauncherSession,
        _owner: Arc<OwnerThread>,
    }

    fn harness(mode: DaemonMode) -> Harness {
        let owner = OwnerThread::spawn("facade-test").unwrap();
        let transport = MockTransport::new();
        let backend = Arc::new(RecordingBackend::default());
        let store = Arc::new(MemoryStore::default());
        let config = LauncherConfig {
            backoff_ms: 10,
            ..Default::default()
        };
        let session = LauncherSession::new(
            config,
            Arc::new(transport.clone()),
            Arc::new(LifecycleController::new(backend.clone(), mode)),
            owner.clone(),
            Arc::new(RecordingSink::default()),
            store.clone(),
        )
        .unwrap();
        Harness {
            transport,
            backend,
            store,
            session,
            _owner: owner,
        }
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {}", what);
    }

    async fn start_streaming(h: &Harness) {
        h.session.start().await.unwrap();
        h.transport.wait_for_streams(3).await;
        eventually("streaming", || h.session.loop_state() == LoopState::Streaming).await;
    }

    fn node_list() -> StreamMessage {
        let node = NodeInfo {
            id: 1,
            name: "NodeA".into(),
            accept_new: true,
            ..Default::default()
        };
        StreamMessage::Nodes(NodeList {
            nodes: BTreeMap::from([(1, node)]),
        })
    }

    #[tokio::test]
    async fn test_session_follows_daemon_and_logs_out() {
        let h = harness(DaemonMode::Unmanaged);
        start_streaming(&h).await;
        assert_eq!(h.backend.actions(), vec!["start Unmanaged"]);

        h.transport.push(node_list());
        h.transport.push(StreamMessage::User(UserInfo::logged_in("alice")));
        eventually("connected", || h.session.connected()).await;
        eventually("logged in", || h.session.logged_in()).await;

        assert_eq!(h.session.nodes()[0].name, "NodeA");
        assert_eq!(h.session.creatable_nodes().len(), 1);
        assert_eq!(h.session.user_token_display(), MASKED_TOKEN);
        assert!(!h.session.token_editable());

        h.session.login_or_logout().await.unwrap();
        assert_eq!(h.transport.calls(), vec![RpcRequest::Logout]);
        assert!(!h.session.logging_in());
        h.session.shutdown().await;
        assert!(!h.session.connected());
    }

    #[tokio::test]
    async fn test_login_with_node_list_present() {
        let h = harness(DaemonMode::Unmanaged);
        start_streaming(&h).await;

        h.transport.push(node_list());
        h.transport.push(StreamMessage::User(UserInfo {
            status: UserStatus::NoLogin,
            ..Default::default()
        }));
        eventually("connected", || h.session.connected()).await;
        assert_eq!(h.session.nodes().len(), 1);

        h.session.set_user_token("secret-token").unwrap();
        h.session.login_or_logout().await.unwrap();
        assert_eq!(
            h.transport.calls(),
            vec![RpcRequest::Login {
                token: "secret-token".into()
            }]
        );
        assert!(!h.session.logging_in());

        h.transport.push(StreamMessage::User(UserInfo::logged_in("alice")));
        eventually("logged in", || h.session.logged_in()).await;
        assert_eq!(h.session.nodes().len(), 1);
        assert_eq!(h.session.nodes()[0].name, "NodeA");
        h.session.shutdown().await;
    }

    #[tokio::test]
    async fn test_login_failure_clears_flag() {
        let h = harness(DaemonMode::Unmanaged);
        start_streaming(&h).await;

        h.session.set_user_token("abc").unwrap();
        assert_eq!(h.session.user_token_display(), "abc");
        h.transport
            .fail_calls_with(Some(RpcError::AuthRejected("bad token".into())));

        let err = h.session.login_or_logout().await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(
            h.transport.calls(),
            vec![RpcRequest::Login {
                token: "abc".into()
            }]
        );
        assert!(!h.session.logging_in());
        assert!(h.session.token_editable());
        h.session.shutdown().await;
    }

    #[tokio::test]
    async fn test_tunnels_reload_and_mutations() {
        let h = harness(DaemonMode::Unmanaged);
        h.transport.set_tunnels(vec![Tunnel {
            id: 5,
            node: 1,
            kind: "tcp".into(),
            ..Default::default()
        }]);
        start_streaming(&h).await;
        h.transport.push(node_list());
        eventually("connected", || h.session.connected()).await;

        let tunnels = h.session.reload_tunnels().await.unwrap();
        assert_eq!(tunnels.len(), 1);
        let views = h.session.tunnel_views();
        assert_eq!(views[0].node_name, "NodeA");
        assert_eq!(views[0].kind, "TCP");

        h.session.set_tunnel_enabled(5, true).await.unwrap();
        h.session.delete_tunnel(5).await.unwrap();
        let calls = h.transport.calls();
        assert_eq!(calls.len(), 3);
        match &calls[1] {
            RpcRequest::UpdateTunnel(update) => {
                assert_eq!(update.action, TunnelAction::Update);
                assert!(update.tunnel.enabled);
            }
            other => panic!("unexpected call: {:?}", other),
        }
        assert!(matches!(
            &calls[2],
            RpcRequest::UpdateTunnel(TunnelUpdate {
                action: TunnelAction::Delete,
                ..
            })
        ));
        // No optimistic local mutation
        assert!(!h.session.tunnel_views()[0].enabled);
        h.session.shutdown().await;
    }

    #[tokio::test]
    async fn test_config_toggles_push_to_daemon() {
        let h = harness(DaemonMode::Unmanaged);
        start_streaming(&h).await;

        // Nothing to edit yet
        h.session.set_bypass_proxy(true).await.unwrap();
        assert!(h.transport.calls().is_empty());

        h.session.set_service_config(Some(ServiceConfig::default())).unwrap();
        h.session.set_remote_management(true).await.unwrap();
        assert!(!h.session.read::<bool>(REMOTE_MANAGEMENT));

        h.session.set_bypass_proxy(true).await.unwrap();
        assert!(h.session.read::<bool>(BYPASS_PROXY));

        h.session
            .set_update(Some(UpdateStatus {
                update_manager_running: true,
                ..Default::default()
            }))
            .unwrap();
        assert!(h.session.check_update());
        h.session.set_check_update(false).await.unwrap();
        assert!(!h.session.check_update());
        assert_eq!(h.session.graph().get::<Option<UpdateStatus>>(UPDATE).unwrap(), None);

        let pushed: Vec<ServiceConfig> = h
            .transport
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RpcRequest::PushServiceConfig(config) => Some(config),
                _ => None,
            })
            .collect();
        assert_eq!(pushed.len(), 3);
        assert!(pushed[1].bypass_proxy);
        assert_eq!(pushed[2].update_interval, UPDATE_INTERVAL_DISABLED);
        h.session.shutdown().await;
    }

    #[tokio::test]
    async fn test_switch_refused_while_logged_in() {
        let h = harness(DaemonMode::Unmanaged);
        h.session
            .graph()
            .set(USER_INFO, UserInfo::logged_in("alice"))
            .unwrap();
        let prompt = ScriptedPrompt::answering(true);

        let result = h.session.switch_working_mode(&prompt).await;
        assert!(matches!(
            result,
            Err(LauncherError::Lifecycle(LifecycleError::PreconditionFailed(_)))
        ));
        assert_eq!(prompt.shown().len(), 1);
        assert!(prompt.shown()[0].starts_with("warn:"));
        assert!(h.backend.actions().is_empty());
    }

    #[tokio::test]
    async fn test_switch_working_mode() {
        let h = harness(DaemonMode::Unmanaged);
        assert_eq!(h.session.working_mode(), "Daemon");

        let declined = ScriptedPrompt::answering(false);
        assert_eq!(h.session.switch_working_mode(&declined).await.unwrap(), None);
        assert!(h.backend.actions().is_empty());

        let prompt = ScriptedPrompt::answering(true);
        let exit = h.session.switch_working_mode(&prompt).await.unwrap();
        assert_eq!(exit, Some(ExitRequired::ModeSwitched(DaemonMode::ManagedService)));
        assert_eq!(h.backend.actions(), vec!["install"]);
        assert_eq!(h.session.working_mode(), "System service");
        assert!(!h.session.read::<bool>(SWITCHING_MODE));
        assert!(prompt.shown().last().unwrap().starts_with("report:"));
    }

    #[tokio::test]
    async fn test_failed_switch_still_requires_exit() {
        let h = harness(DaemonMode::Unmanaged);
        h.backend.running.store(true, Ordering::SeqCst);
        h.backend.deny_install.store(true, Ordering::SeqCst);
        let prompt = ScriptedPrompt::answering(true);

        let exit = h.session.switch_working_mode(&prompt).await.unwrap();
        assert_eq!(exit, Some(ExitRequired::ModeSwitchFailed));
        assert_eq!(
            h.backend.actions(),
            vec!["stop Unmanaged", "install", "start Unmanaged"]
        );
        assert_eq!(h.session.daemon_mode(), DaemonMode::Unmanaged);
        assert!(!h.session.read::<bool>(SWITCHING_MODE));
        let last = prompt.shown().last().unwrap().clone();
        assert!(last.starts_with("report: Failed to switch"));
        assert!(last.contains("will exit"));
    }

    #[tokio::test]
    async fn test_update_hand_off() {
        let h = harness(DaemonMode::ManagedService);
        let prompt = ScriptedPrompt::answering(true);
        assert_eq!(h.session.confirm_update(&prompt).await.unwrap(), None);

        h.session
            .set_update(Some(UpdateStatus {
                update_manager_running: true,
                update_available: true,
                update_ready_dir: "/tmp/update/".into(),
                note: "Bug fixes".into(),
                ..Default::default()
            }))
            .unwrap();
        assert!(h.session.have_update());

        let exit = h.session.confirm_update(&prompt).await.unwrap();
        assert_eq!(exit, Some(ExitRequired::UpdateHandoff));
        assert!(prompt.shown()[0].contains("Bug fixes"));
        assert_eq!(h.backend.actions(), vec!["update /tmp/update cli"]);
    }

    #[tokio::test]
    async fn test_preferences_are_saved() {
        let h = harness(DaemonMode::Unmanaged);
        assert_eq!(h.session.notification_mode(), NotificationMode::ShowAll);

        h.session.set_notification_mode(NotificationMode::SuppressAll).unwrap();
        h.session.set_log_text_wrapping(true).unwrap();

        let saved = h.store.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved.notification_mode, NotificationMode::SuppressAll);
        assert!(saved.log_text_wrapping);
    }
}
