//! Ownership and delivery properties over random invocation sequences.

use std::sync::{Arc, Weak};

use proptest::prelude::*;
use runtime_bridge::testing::{Outcome, RecordingSink, ScriptedTesterEnv};
use runtime_bridge::{
    BridgeConfig, ErrorCode, HostMsg, HostSink, Msg, OwnerError, ProxiedOp, StatusCode,
    TesterBridge,
};

fn op_strategy() -> impl Strategy<Value = ProxiedOp> {
    prop_oneof![
        Just(ProxiedOp::ReturnResult),
        Just(ProxiedOp::SendData),
        Just(ProxiedOp::SendAudioFrame),
        Just(ProxiedOp::SendVideoFrame),
    ]
}

fn code_strategy() -> impl Strategy<Value = ErrorCode> {
    prop_oneof![
        Just(ErrorCode::Ok),
        Just(ErrorCode::Generic),
        Just(ErrorCode::InvalidArgument),
        Just(ErrorCode::MsgNotConnected),
        Just(ErrorCode::Timeout),
    ]
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Succeed),
        Just(Outcome::Defer),
        Just(Outcome::Swallow),
        code_strategy()
            .prop_filter("completion failures carry an error code", |c| *c != ErrorCode::Ok)
            .prop_map(|code| Outcome::Fail(OwnerError::new(code, "failed"))),
        code_strategy().prop_map(|code| Outcome::RejectStart(OwnerError::new(code, "refused"))),
        code_strategy().prop_map(|code| Outcome::AbandonStart(OwnerError::new(code, "abandoned"))),
    ]
}

fn payload_for(op: ProxiedOp, index: usize) -> Msg {
    match op {
        ProxiedOp::ReturnResult => Msg::cmd_result(StatusCode::Ok),
        ProxiedOp::SendData => Msg::data(format!("data-{index}")),
        ProxiedOp::SendAudioFrame => Msg::audio_frame(format!("audio-{index}")),
        ProxiedOp::SendVideoFrame => Msg::video_frame(format!("video-{index}")),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every live handle is resolved exactly once, sentinel handles never are,
    /// and every submitted payload is released by the time the session closes.
    #[test]
    fn live_handles_resolve_exactly_once(
        calls in prop::collection::vec((op_strategy(), outcome_strategy(), any::<bool>()), 1..24)
    ) {
        let sink = Arc::new(RecordingSink::new());
        let host: Arc<dyn HostSink> = sink.clone();
        let bridge = TesterBridge::start(&BridgeConfig::default(), host, ScriptedTesterEnv::new)
            .unwrap();

        let script: Vec<Outcome> = calls.iter().map(|(_, outcome, _)| outcome.clone()).collect();
        bridge
            .execute(move |env| script.into_iter().for_each(|o| env.push_outcome(o)))
            .unwrap();

        let mut weaks: Vec<Weak<Msg>> = Vec::new();
        let mut expected: Vec<(i64, bool)> = Vec::new();
        for (index, (op, outcome, live)) in calls.iter().enumerate() {
            let handler = if *live { index as i64 + 1 } else { -(index as i64) };
            let mut msg = HostMsg::new(payload_for(*op, index));
            weaks.push(msg.downgrade().unwrap());

            bridge.invoke(*op, &mut msg, handler).unwrap();
            prop_assert!(msg.is_moved());
            if *live {
                expected.push((handler, *outcome == Outcome::Succeed));
            }
        }

        bridge.close();

        let delivered = sink.take();
        prop_assert_eq!(delivered.len(), expected.len());
        for (handler, succeeds) in expected {
            let matches: Vec<_> = delivered.iter().filter(|(id, _)| id.get() == handler).collect();
            prop_assert_eq!(matches.len(), 1);
            prop_assert_eq!(matches[0].1.is_ok(), succeeds);
        }
        prop_assert!(weaks.iter().all(|weak| weak.upgrade().is_none()));
    }

    /// Calls against a closed session never take the payload.
    #[test]
    fn closed_session_never_takes_payload(
        op in op_strategy(),
        handler in -10i64..100,
    ) {
        let sink = Arc::new(RecordingSink::new());
        let host: Arc<dyn HostSink> = sink.clone();
        let bridge = TesterBridge::start(&BridgeConfig::default(), host, ScriptedTesterEnv::new)
            .unwrap();
        bridge.close();

        let mut msg = HostMsg::new(payload_for(op, 0));
        let err = bridge.invoke(op, &mut msg, handler).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::SessionClosed);
        prop_assert!(!msg.is_moved());
        prop_assert!(sink.is_empty());
    }
}
