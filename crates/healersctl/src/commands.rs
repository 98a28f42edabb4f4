//! One-shot commands: assistance bot, resource allocator, SMS, medicine
//! finder and map.
//!
//! Each command takes its client explicitly so tests can hand in fakes.
//! Domain failures are returned as `HealersError` inside the `anyhow::Error`
//! so `main` can pick the exit code.

use anyhow::Result;
use healers_common::capability::CapabilityAcquirer;
use healers_common::config::{MapsConfig, ENV_GOOGLE_MAPS_API_KEY};
use healers_common::error::HealersError;
use healers_common::flow_client::AiFlowClient;
use healers_common::flows::ResourceCounts;
use healers_common::map::MapView;
use healers_common::pickup;
use healers_common::sms::{NotificationClient, SmsOutcome, SmsTransport};
use owo_colors::OwoColorize;
use std::io::Write;

use crate::output;
use crate::spinner::Spinner;

pub const MSG_SCENARIO_TOO_SHORT: &str = "Please provide a more detailed description.";

/// Reject text shorter than `min` characters (after trimming)
pub fn require_min_chars(text: &str, min: usize, message: &str) -> Result<(), HealersError> {
    if text.trim().chars().count() < min {
        return Err(HealersError::Validation(message.to_string()));
    }
    Ok(())
}

pub fn situation_too_short(min_chars: usize) -> String {
    format!(
        "Please describe the situation in at least {} characters.",
        min_chars
    )
}

/// Assistance bot: instructions for one situation. Unlike the emergency
/// flow, a failed call is reported rather than replaced with fallback text.
pub async fn first_aid(
    flows: &AiFlowClient,
    min_chars: usize,
    situation: &str,
    out: &mut impl Write,
) -> Result<()> {
    require_min_chars(situation, min_chars, &situation_too_short(min_chars))?;

    let spinner = Spinner::new("Getting first-aid instructions...");
    let result = flows.get_first_aid_instructions(situation.trim()).await;
    spinner.stop();

    match result {
        Ok(instructions) => {
            writeln!(out, "{}", "First-Aid Instructions".bold())?;
            for line in instructions.lines() {
                writeln!(out, "  {}", line)?;
            }
            output::disclaimer(out)?;
            Ok(())
        }
        Err(e) => {
            output::failure(
                out,
                "Error getting instructions. There was an issue with the AI assistant. Please try again.",
            )?;
            output::disclaimer(out)?;
            Err(HealersError::from(e).into())
        }
    }
}

/// Resource allocator: predicted needs for a scenario
pub async fn predict(
    flows: &AiFlowClient,
    min_chars: usize,
    scenario: &str,
    counts: ResourceCounts,
    out: &mut impl Write,
) -> Result<()> {
    require_min_chars(scenario, min_chars, MSG_SCENARIO_TOO_SHORT)?;

    let spinner = Spinner::new("Predicting resource needs...");
    let result = flows.predict_resource_allocation(scenario.trim(), counts).await;
    spinner.stop();

    match result {
        Ok(prediction) => {
            output::prediction(out, &prediction)?;
            Ok(())
        }
        Err(e) => {
            output::failure(
                out,
                "Prediction Failed. Could not get a resource prediction. Please try again later.",
            )?;
            Err(HealersError::from(e).into())
        }
    }
}

pub async fn sms<T: SmsTransport>(
    client: &NotificationClient<T>,
    to: &str,
    message: &str,
    out: &mut impl Write,
) -> Result<SmsOutcome> {
    let receipt = client
        .send_sms(to, message)
        .await
        .map_err(HealersError::from)?;
    output::success(out, &format!("SMS sent. SID: {}", receipt.message_id))?;
    Ok(receipt.into())
}

/// Medicine finder. With `preorder`, `confirm` is asked before the order is
/// placed and gets the confirmation prompt.
pub fn medicine(
    search: Option<&str>,
    preorder: Option<&str>,
    confirm: impl FnOnce(&str) -> bool,
    out: &mut impl Write,
) -> Result<()> {
    let Some(name) = preorder else {
        let found = pickup::search(search.unwrap_or_default());
        output::pickups(out, &found)?;
        return Ok(());
    };

    let location = pickup::find(name).ok_or_else(|| {
        HealersError::Validation(format!("No pickup location named '{}'", name))
    })?;

    writeln!(out, "Confirm Pre-order")?;
    if confirm(&location.preorder_prompt()) {
        output::success(
            out,
            &format!("Pre-order placed at {}. Pay at the pickup point.", location.name),
        )?;
    } else {
        output::hint(out, "Pre-order cancelled.")?;
    }
    Ok(())
}

/// Map view, optionally re-centred on the device location
pub async fn map(
    config: &MapsConfig,
    capabilities: Option<&dyn CapabilityAcquirer>,
    out: &mut impl Write,
) -> Result<()> {
    let mut view = match MapView::new(config) {
        Ok(view) => view.with_markers(pickup::markers()),
        Err(e) => {
            output::failure(out, "Google Maps API Key is missing.")?;
            output::hint(
                out,
                &format!("Please add {} to your environment or config file.", ENV_GOOGLE_MAPS_API_KEY),
            )?;
            return Err(HealersError::from(e).into());
        }
    };

    if let Some(capabilities) = capabilities {
        if let Err(e) = view.use_my_location(capabilities).await {
            output::failure(out, e.message())?;
        }
    }

    let url = view.static_url().map_err(HealersError::from)?;
    output::map(out, &view, url.as_str())?;
    Ok(())
}
