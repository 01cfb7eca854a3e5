//! Session driver

use super::Participant;
use crate::{AggregateValue, Result, Transport};
use tracing::{debug, info, instrument};

/// Run a full session for `participant` over `transport`.
///
/// Executes login, setup and rounds 0, 1, 2 and 4 in order, feeding each
/// server response into the engine. Returns the aggregate; any engine or
/// transport error ends the session.
#[instrument(skip_all)]
pub async fn run_session<V, T>(participant: &mut Participant<V>, transport: &T) -> Result<V>
where
    V: AggregateValue,
    T: Transport<V> + ?Sized,
{
    let user_id = transport.login().await?;
    participant.save_login_data(user_id)?;
    info!(user_id, "Logged in");

    let config = transport.setup().await?;
    debug!(
        user_id,
        users = config.number_of_users,
        threshold = config.threshold,
        "Received configuration"
    );
    participant.save_setup_data(config)?;

    let round0 = participant.round0()?;
    transport.send_round0(user_id, &round0).await?;
    participant.process_round0_data(transport.fetch_round0().await?)?;

    let round1 = participant.round1()?;
    transport.send_round1(user_id, &round1).await?;
    participant.process_round1_data(transport.fetch_round1(user_id).await?)?;

    let round2 = participant.round2()?;
    transport.send_round2(user_id, &round2).await?;
    participant.process_round2_data(transport.fetch_round2().await?)?;

    let round4 = participant.round4()?;
    transport.send_round4(user_id, &round4).await?;
    let result = transport.fetch_round4().await?;
    let value = result.value.clone();
    participant.process_round4_data(result)?;

    info!(user_id, "Session complete");
    Ok(value)
}
