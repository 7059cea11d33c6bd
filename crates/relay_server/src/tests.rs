
// Include tests
#[cfg(test)]
mod tests {
    use crate::activity::ActivityKind;
    use crate::messaging::{classify, commands};
    use crate::registry::{ClientId, ClientStatus};
    use crate::relay::events::{DashboardEvent, DashboardRequest, SessionId};
    use crate::transport::recording::{RecordingDashboards, RecordingGames};
    use crate::*;
    use futures_util::{SinkExt, Stream, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    type TestRelay = RelayCore<RecordingGames, RecordingDashboards>;

    fn relay() -> TestRelay {
        RelayCore::new(
            RelayConfig::default(),
            RecordingGames::default(),
            RecordingDashboards::default(),
        )
    }

    fn world_snapshot_frame() -> String {
        let chat = json!({
            "rawtext": [
                {"text": "§e=== World Data Snapshot ==="},
                {"text": r#"{"from":{"projectName":"P","worldId":"W"},"data":[{"name":"Alice"}]}"#},
            ]
        });
        json!({
            "header": {"version": 1, "messagePurpose": "event", "eventName": "PlayerMessage"},
            "body": {"message": chat.to_string(), "sender": "Script Engine"},
        })
        .to_string()
    }

    fn player_message_frame(sender: &str, message: &str) -> String {
        json!({
            "header": {"version": 1, "messagePurpose": "event", "eventName": "PlayerMessage"},
            "body": {"properties": {"Sender": sender, "Message": message}},
        })
        .to_string()
    }

    fn game_end_frame() -> String {
        let chat = json!({"rawtext": [{"text": "§cGame Ended!"}, {"text": "Thanks for playing"}]});
        json!({
            "header": {"version": 1, "messagePurpose": "event", "eventName": "PlayerMessage"},
            "body": {"message": chat.to_string(), "sender": "Server"},
        })
        .to_string()
    }

    fn announced_pin(relay: &TestRelay, client: ClientId) -> String {
        relay
            .games()
            .commands_for(client)
            .iter()
            .find_map(|c| c.strip_prefix("/scriptevent daigon:webhook_code ").map(str::to_string))
            .expect("client should have been shown a PIN")
    }

    #[test]
    fn test_world_snapshot_is_recorded_and_forwarded() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());

        relay.on_game_message(client, &world_snapshot_frame());

        let newest = &relay.activity().recent(1)[0];
        assert_eq!(newest.kind, ActivityKind::WorldSnapshot);
        assert_eq!(newest.data["projectName"], "P");
        assert_eq!(newest.data["worldId"], "W");
        assert_eq!(newest.data["playerCount"], 1);

        let forwarded = relay.dashboards().published_named("minecraft_data");
        assert_eq!(forwarded.len(), 1);
        let frame = serde_json::to_value(forwarded[0]).expect("event should encode");
        assert_eq!(frame["data"]["type"], "world_data_snapshot");
        assert_eq!(frame["data"]["data"]["from"]["projectName"], "P");
        assert_eq!(frame["data"]["clientId"], client.to_string());
    }

    #[test]
    fn test_player_message_updates_display_name() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());

        relay.on_game_message(client, &player_message_frame("Bob", "hi"));

        let newest = &relay.activity().recent(1)[0];
        assert_eq!(newest.kind, ActivityKind::PlayerMessage);
        assert_eq!(newest.player_name.as_deref(), Some("Bob"));
        assert_eq!(newest.data["sender"], "Bob");
        assert_eq!(newest.data["message"], "hi");

        let record = relay.registry().get(client).expect("client should be registered");
        assert_eq!(record.display_name.as_deref(), Some("Bob"));
        assert_eq!(record.data_update_count, 1);
    }

    #[test]
    fn test_known_name_fills_missing_sender() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        relay.on_game_message(client, &player_message_frame("Bob", "first"));

        let anonymous = json!({
            "header": {"eventName": "PlayerMessage"},
            "body": {"message": "second"},
        })
        .to_string();
        relay.on_game_message(client, &anonymous);

        let newest = &relay.activity().recent(1)[0];
        assert_eq!(newest.data["sender"], "Bob");
        assert_eq!(newest.data["message"], "second");
    }

    #[test]
    fn test_game_end_dispatches_one_refresh() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let before = relay.activity().len();

        relay.on_game_message(client, &game_end_frame());

        let refreshes = relay
            .games()
            .commands_for(client)
            .into_iter()
            .filter(|c| c == commands::REFRESH)
            .count();
        assert_eq!(refreshes, 1);

        let added = relay.activity().recent(relay.activity().len() - before);
        assert_eq!(added.len(), 2);
        let refresh_events: Vec<_> = added
            .iter()
            .filter(|e| e.data["messageType"] == "game_end_refresh")
            .collect();
        assert_eq!(refresh_events.len(), 1);
        assert_eq!(refresh_events[0].kind, ActivityKind::DataUpdate);
        // the classified message is recorded before the refresh note
        assert_eq!(added[0].data["messageType"], "game_end_refresh");
    }

    #[test]
    fn test_game_end_inside_snapshot_keeps_both_outcomes() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let chat = json!({
            "rawtext": [
                {"text": "World Data Snapshot"},
                {"text": r#"{"from":{"projectName":"P","worldId":"W"},"data":[]}"#},
                {"text": "§cGame Ended!"},
            ]
        });
        let frame = json!({"header": {}, "body": {"message": chat.to_string()}}).to_string();

        relay.on_game_message(client, &frame);

        let kinds: Vec<_> = relay.activity().recent(2).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::DataUpdate, ActivityKind::WorldSnapshot]);
    }

    #[test]
    fn test_every_message_publishes_registry_snapshot() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let after_connect = relay.dashboards().published_named("clients_update").len();

        relay.on_game_message(client, "not json at all");
        relay.on_game_message(client, &player_message_frame("Ann", "yo"));

        let updates = relay.dashboards().published_named("clients_update");
        assert_eq!(updates.len(), after_connect + 2);
        match updates.last() {
            Some(DashboardEvent::ClientsUpdate(list)) => {
                assert_eq!(list.clients[0].data_update_count, 2);
                assert_eq!(list.total_connected, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(relay.activity().recent(2)[1].data["rawMessage"], "not json at all");
    }

    #[test]
    fn test_pin_pairing_flow() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let pin = announced_pin(&relay, client);
        let session = SessionId::new();
        relay.on_dashboard_connect(session, ());

        let unknown = relay.validate_pin(session, "000000");
        assert!(!unknown.success);
        assert_eq!(unknown.reason, Some("not_found"));

        let accepted = relay.validate_pin(session, &pin);
        assert!(accepted.success);
        assert_eq!(accepted.client_id, Some(client));
        let token = accepted.uuid.expect("accepted PIN should carry a token");
        assert!(relay
            .games()
            .commands_for(client)
            .contains(&commands::code_valid(&token.to_string())));

        let again = relay.validate_pin(session, &pin);
        assert!(!again.success);
        assert_eq!(again.reason, Some("already_used"));
        assert_eq!(again.message, "PIN has already been used");

        let answers: Vec<_> = relay
            .dashboards()
            .direct_for(session)
            .into_iter()
            .filter(|e| e.name() == "pin_validation_result")
            .collect();
        assert_eq!(answers.len(), 3);
        assert!(relay.dashboards().published_named("pin_validation_result").is_empty());
    }

    #[test]
    fn test_pin_stays_used_when_confirmation_fails() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let pin = announced_pin(&relay, client);
        relay.games_mut().break_connection(client);

        let first = relay.validate_pin(SessionId::new(), &pin);
        assert!(!first.success);
        assert_eq!(first.message, "Failed to communicate with Minecraft client");

        let second = relay.validate_pin(SessionId::new(), &pin);
        assert_eq!(second.reason, Some("already_used"));
    }

    #[test]
    fn test_disconnect_revokes_pin() {
        let mut relay = relay();
        let client = relay.on_game_connect("127.0.0.1", 40000, ());
        let pin = announced_pin(&relay, client);

        relay.on_game_close(client);

        let result = relay.validate_pin(SessionId::new(), &pin);
        assert_eq!(result.reason, Some("not_found"));
        let newest = &relay.activity().recent(1)[0];
        assert_eq!(newest.kind, ActivityKind::Disconnection);
        assert_eq!(newest.data["message"], format!("Client {client} disconnected"));
    }

    #[test]
    fn test_broadcast_reaches_connected_clients_only() {
        let mut relay = relay();
        let session = SessionId::new();
        relay.on_dashboard_connect(session, ());

        let nobody = relay.send_command(session, "/say hi".to_string(), None);
        assert!(!nobody.success);

        let a = relay.on_game_connect("127.0.0.1", 1, ());
        let b = relay.on_game_connect("127.0.0.1", 2, ());
        let c = relay.on_game_connect("127.0.0.1", 3, ());
        relay.on_game_error(b, "reset");
        relay.on_game_close(c);

        let result = relay.send_command(session, "/say hi".to_string(), Some(String::new()));
        assert!(result.success);
        assert!(relay.games().commands_for(a).contains(&"/say hi".to_string()));
        assert!(!relay.games().commands_for(b).contains(&"/say hi".to_string()));
        assert!(!relay.games().commands_for(c).contains(&"/say hi".to_string()));

        let frame = serde_json::to_value(&DashboardEvent::CommandResult(result))
            .expect("result should encode");
        assert_eq!(frame["data"]["targetClientId"], "");
    }

    #[test]
    fn test_targeted_command_reports_exact_delivery() {
        let mut relay = relay();
        let session = SessionId::new();
        relay.on_dashboard_connect(session, ());
        let client = relay.on_game_connect("127.0.0.1", 1, ());

        let hit = relay.send_command(session, "/time set day".to_string(), Some(client.to_string()));
        assert!(hit.success);

        relay.on_game_close(client);
        let miss = relay.send_command(session, "/time set day".to_string(), Some(client.to_string()));
        assert!(!miss.success);

        let stranger = relay.send_command(
            session,
            "/time set day".to_string(),
            Some(ClientId::new().to_string()),
        );
        assert!(!stranger.success);
    }

    #[test]
    fn test_dashboard_requests_route_through_core() {
        let mut relay = relay();
        let session = SessionId::new();
        relay.on_dashboard_connect(session, ());
        relay.on_game_connect("127.0.0.1", 1, ());

        let request = DashboardRequest::parse(
            r#"{"event":"send_minecraft_command","data":{"command":"/weather clear"}}"#,
        )
        .expect("request should parse");
        relay.on_dashboard_request(session, request);

        let last = relay.dashboards().direct_for(session).pop().cloned();
        match last {
            Some(DashboardEvent::CommandResult(result)) => {
                assert!(result.success);
                assert_eq!(result.command, "/weather clear");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_session_start_delivers_snapshot_history_status() {
        let mut relay = relay();
        let client = relay.on_game_connect("10.1.1.1", 40000, ());
        for i in 0..60 {
            relay.on_game_message(client, &player_message_frame("Eve", &format!("line {i}")));
        }

        let session = SessionId::new();
        relay.on_dashboard_connect(session, ());

        let initial = relay.dashboards().direct_for(session);
        let names: Vec<_> = initial.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["clients_update", "activity_history", "minecraft_status"]);

        match initial[1] {
            DashboardEvent::ActivityHistory(history) => {
                assert_eq!(history.len(), 50);
                assert_eq!(history[0].data["message"], "line 59");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match initial[2] {
            DashboardEvent::MinecraftStatus(status) => {
                assert!(status.connected);
                assert_eq!(status.server_info.address, "10.1.1.1");
                assert_eq!(status.message, "1 Minecraft client(s) connected");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_eviction_ignores_reconnected_clients() {
        let mut relay = relay();
        let first = relay.on_game_connect("127.0.0.1", 1, ());
        relay.on_game_close(first);
        let second = relay.on_game_connect("127.0.0.1", 1, ());
        assert_ne!(first, second);

        for id in relay.take_pending_evictions() {
            relay.evict(id);
        }
        // a late duplicate timer is harmless
        relay.evict(first);
        relay.evict(second);

        assert!(relay.registry().get(first).is_none());
        let survivor = relay.registry().get(second).expect("new connection should survive");
        assert_eq!(survivor.status, ClientStatus::Connected);
    }

    #[test]
    fn test_activity_log_bound_holds_through_core() {
        let config = RelayConfig {
            activity_capacity: 10,
            ..RelayConfig::default()
        };
        let mut relay = RelayCore::new(config, RecordingGames::default(), RecordingDashboards::default());
        let client = relay.on_game_connect("127.0.0.1", 1, ());
        for _ in 0..25 {
            relay.on_game_message(client, "{}");
        }
        assert_eq!(relay.activity().len(), 10);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let frame = player_message_frame("Bob", "hi");
        let first = classify(&frame, Some("Someone"));
        let second = classify(&frame, Some("Someone"));
        assert_eq!(first, second);
    }

    async fn next_json<S>(stream: &mut S) -> Value
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("frame should arrive in time")
                .expect("stream should stay open")
                .expect("frame should be valid");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).expect("frame should be JSON");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_relay_over_real_sockets() {
        let config = RelayConfig {
            game_bind_address: "127.0.0.1:0".parse().expect("valid address"),
            dashboard_bind_address: "127.0.0.1:0".parse().expect("valid address"),
            ..RelayConfig::default()
        };
        let server = create_server_with_config(config);
        let relay = server.relay_handle();
        let stop = server.shutdown_sender();
        let listeners = server.bind().await.expect("listeners should bind");
        let game_addr = listeners.game_addr().expect("game address");
        let dashboard_addr = listeners.dashboard_addr().expect("dashboard address");
        let serving = tokio::spawn(server.serve(listeners));

        let (mut game, _) = connect_async(format!("ws://{game_addr}"))
            .await
            .expect("game client should connect");
        let subscribe = next_json(&mut game).await;
        assert_eq!(subscribe["body"]["eventName"], "PlayerMessage");
        let ack = next_json(&mut game).await;
        assert_eq!(ack["body"]["commandLine"], commands::CONNECTED);
        let code = next_json(&mut game).await;
        let pin = code["body"]["commandLine"]
            .as_str()
            .and_then(|c| c.strip_prefix("/scriptevent daigon:webhook_code "))
            .expect("code command should carry a PIN")
            .to_string();

        let (mut dashboard, _) = connect_async(format!("ws://{dashboard_addr}"))
            .await
            .expect("dashboard should connect");
        let snapshot = next_json(&mut dashboard).await;
        assert_eq!(snapshot["event"], "clients_update");
        assert_eq!(snapshot["data"]["totalConnected"], 1);
        assert_eq!(next_json(&mut dashboard).await["event"], "activity_history");
        assert_eq!(next_json(&mut dashboard).await["event"], "minecraft_status");

        let request = json!({"event": "validate_pin", "data": {"pin": pin}}).to_string();
        dashboard
            .send(Message::Text(request.into()))
            .await
            .expect("dashboard should send");
        let result = next_json(&mut dashboard).await;
        assert_eq!(result["event"], "pin_validation_result");
        assert_eq!(result["data"]["success"], true);

        let confirm = next_json(&mut game).await;
        assert!(confirm["body"]["commandLine"]
            .as_str()
            .is_some_and(|c| c.starts_with("/scriptevent daigon:code_valid ")));

        let _ = stop.send(());
        serving
            .await
            .expect("server task should join")
            .expect("server should stop cleanly");
        relay.shutdown().await.expect("relay should shut down");
    }
}
