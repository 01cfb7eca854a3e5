//! Full sessions between participants and a coordinator in one process

use futures_util::future::join_all;
use secagg_coordinator::{Coordinator, MemoryTransport, Phase, SharedCoordinator};
use secagg_core::{
    run_session, AbortReason, AggregateValue, Configuration, Participant, SaInt, Transport,
};
use std::time::Duration;
use tokio::task::JoinHandle;

const MODULUS: u64 = 1 << 32;

fn session(users: usize, threshold: usize) -> SharedCoordinator<SaInt> {
    let config = Configuration::new(users, threshold, MODULUS, b"end to end".to_vec()).unwrap();
    SharedCoordinator::new(Coordinator::new(config).unwrap())
}

fn spawn_participants(
    shared: &SharedCoordinator<SaInt>,
    values: &[u64],
) -> Vec<JoinHandle<secagg_core::Result<SaInt>>> {
    values
        .iter()
        .map(|&value| {
            let transport = MemoryTransport::new(shared.clone());
            tokio::spawn(async move {
                let mut participant = Participant::new(SaInt(value));
                run_session(&mut participant, &transport).await
            })
        })
        .collect()
}

fn sum(values: &[u64]) -> SaInt {
    values
        .iter()
        .fold(SaInt::zero(), |acc, &v| acc.add(&SaInt(v), MODULUS))
}

/// Follows the protocol through round 0, or round 1 if `share_keys`, then
/// goes silent
async fn drop_out(transport: MemoryTransport<SaInt>, value: u64, share_keys: bool) {
    let mut participant = Participant::new(SaInt(value));

    let user = transport.login().await.unwrap();
    participant.save_login_data(user).unwrap();
    participant
        .save_setup_data(transport.setup().await.unwrap())
        .unwrap();

    let keys = participant.round0().unwrap();
    transport.send_round0(user, &keys).await.unwrap();

    if share_keys {
        let data = transport.fetch_round0().await.unwrap();
        participant.process_round0_data(data).unwrap();
        let shares = participant.round1().unwrap();
        transport.send_round1(user, &shares).await.unwrap();
    }
}

/// Wait until `phase` has collected `submissions` messages
async fn await_submissions(shared: &SharedCoordinator<SaInt>, phase: Phase, submissions: usize) {
    for _ in 0..1000 {
        let status = shared.read(|c| c.status()).await;
        if status.phase == phase && status.submissions == submissions {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never collected {} submissions", phase, submissions);
}

#[tokio::test]
async fn test_sum_without_dropouts() {
    let values = [3, 1 << 31, 17, 999_999, 0];
    let shared = session(values.len(), 3);

    let results = join_all(spawn_participants(&shared, &values)).await;

    for result in results {
        assert_eq!(result.unwrap().unwrap(), sum(&values));
    }
    assert_eq!(shared.read(|c| c.phase()).await, Phase::Finished);
}

#[tokio::test]
async fn test_sum_with_dropout_after_round1() {
    let survivors = [40, 2, 9];
    let shared = session(4, 2);

    let handles = spawn_participants(&shared, &survivors);
    drop_out(MemoryTransport::new(shared.clone()), 1000, true).await;

    await_submissions(&shared, Phase::Round2, survivors.len()).await;
    assert_eq!(
        shared.update(|c| c.finish_collection()).await.unwrap(),
        Phase::Round4
    );

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().unwrap(), sum(&survivors));
    }
}

#[tokio::test]
async fn test_sum_with_dropout_after_round0() {
    let survivors = [5, 6, 7];
    let shared = session(4, 2);

    let handles = spawn_participants(&shared, &survivors);
    drop_out(MemoryTransport::new(shared.clone()), 1000, false).await;

    await_submissions(&shared, Phase::Round1, survivors.len()).await;
    shared.update(|c| c.finish_collection()).await.unwrap();

    for result in join_all(handles).await {
        assert_eq!(result.unwrap().unwrap(), SaInt(18));
    }
}

#[tokio::test]
async fn test_too_many_dropouts_abort() {
    let survivors = [1, 2];
    let shared = session(4, 3);

    let handles = spawn_participants(&shared, &survivors);
    tokio::join!(
        drop_out(MemoryTransport::new(shared.clone()), 3, false),
        drop_out(MemoryTransport::new(shared.clone()), 4, false),
    );

    await_submissions(&shared, Phase::Round1, survivors.len()).await;
    assert_eq!(
        shared.update(|c| c.finish_collection()).await.unwrap(),
        Phase::Aborted
    );

    for result in join_all(handles).await {
        assert!(result.unwrap().is_err());
    }
    let status = shared.read(|c| c.status()).await;
    assert_eq!(status.abort_reason, Some(AbortReason::ThresholdUndercut));
    assert!(status.result.is_none());
}

#[tokio::test]
async fn test_exactly_threshold_survivors_abort() {
    let survivors = [1, 2];
    let shared = session(3, 2);

    let handles = spawn_participants(&shared, &survivors);
    drop_out(MemoryTransport::new(shared.clone()), 3, true).await;

    await_submissions(&shared, Phase::Round2, survivors.len()).await;
    assert_eq!(
        shared.update(|c| c.finish_collection()).await.unwrap(),
        Phase::Aborted
    );

    for result in join_all(handles).await {
        assert!(result.unwrap().is_err());
    }
    let status = shared.read(|c| c.status()).await;
    assert_eq!(status.abort_reason, Some(AbortReason::ThresholdUndercut));
}

#[tokio::test]
async fn test_fetch_times_out_while_phase_open() {
    let shared = session(2, 1);
    let transport = MemoryTransport::new(shared.clone()).with_polling(Duration::from_millis(1), 3);

    transport.login().await.unwrap();
    let err = transport.setup().await.unwrap_err();
    assert!(matches!(err, secagg_core::Error::Timeout(_)));
}
