//! Terminal rendering for dispatch views, flow results and catalogs

use healers_common::dispatch::{Eta, GuidanceStatus, SessionView, Step};
use healers_common::flows::ResourceAllocationOutput;
use healers_common::map::MapView;
use healers_common::pickup::PickupLocation;
use owo_colors::OwoColorize;
use std::io::{self, Write};

pub const DISCLAIMER: &str = "This is not a substitute for professional medical advice.";
pub const DISCLAIMER_DETAIL: &str =
    "Always call emergency services in a real emergency. These instructions are for guidance only.";

pub fn success(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "✓".bright_green(), message)
}

pub fn failure(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "✗".bright_red(), message)
}

pub fn hint(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "  {}", message.dimmed())
}

/// Step title with its position in the flow
pub fn step_header(out: &mut impl Write, view: &SessionView) -> io::Result<()> {
    let steps = view.variant.steps();
    let position = steps.iter().position(|s| *s == view.step).unwrap_or(0) + 1;
    writeln!(out)?;
    writeln!(
        out,
        "{} {}",
        format!("[{}/{}]", position, steps.len()).dimmed(),
        view.step.human_label().bold()
    )
}

/// Body of the current step: capability state, prompts, results
pub fn step_body(out: &mut impl Write, view: &SessionView) -> io::Result<()> {
    match view.step {
        Step::Contact => {
            hint(out, "Who should we notify? Enter a phone number like +919876543210.")?;
            hint(out, "Press Enter to continue without one, or type 'skip'.")?;
        }
        Step::Location => match (&view.location, &view.location_error) {
            (Some(coords), _) => {
                success(out, &format!("Location acquired: {}", coords))?;
                hint(out, "Connecting to Emergency Services...")?;
            }
            (None, Some(error)) => {
                failure(out, error)?;
                hint(out, "Help cannot be dispatched without your location. Type 'quit' to close.")?;
            }
            (None, None) => hint(out, "Requesting your location...")?,
        },
        Step::Vitals => {
            if view.camera_live {
                success(out, "Camera connected. Point it at the injured person.")?;
            } else if let Some(error) = &view.camera_error {
                failure(out, error)?;
            }
            hint(out, "Type 'continue' when ready, or 'skip'.")?;
        }
        Step::Guidance => {
            if view.guidance == GuidanceStatus::Idle {
                hint(
                    out,
                    "Describe the situation, e.g. 'Person is unconscious but breathing after a fall.'",
                )?;
            }
            hint(out, "Type 'continue' to start live tracking.")?;
        }
        Step::Tracking => {
            writeln!(out, "{}", "Help is en route. Stay on the line.".bright_white())?;
            if let Some(coords) = &view.location {
                hint(out, &format!("Responders are heading to {}", coords))?;
            }
            eta(out, view.eta)?;
        }
    }
    Ok(())
}

pub fn instructions(out: &mut impl Write, view: &SessionView) -> io::Result<()> {
    let Some(text) = &view.instructions else {
        return Ok(());
    };
    writeln!(out)?;
    writeln!(out, "{}", "First-Aid Steps".bold())?;
    for line in text.lines() {
        writeln!(out, "  {}", line)?;
    }
    if view.is_degraded() {
        hint(out, "(AI guidance unavailable, showing standard advice)")?;
    }
    Ok(())
}

pub fn eta(out: &mut impl Write, eta: Eta) -> io::Result<()> {
    writeln!(
        out,
        "  Ambulance ETA: {}   Drone ETA: {}",
        format!("{} min", eta.ambulance_min).bright_yellow(),
        format!("{} min", eta.drone_min).bright_cyan()
    )
}

pub fn disclaimer(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", DISCLAIMER.bright_red())?;
    hint(out, DISCLAIMER_DETAIL)
}

pub fn prediction(out: &mut impl Write, output: &ResourceAllocationOutput) -> io::Result<()> {
    writeln!(out, "{}", "Predicted Needs".bold())?;
    writeln!(out, "  Ambulances: {}", output.predicted_ambulance_need)?;
    writeln!(out, "  Drones:     {}", output.predicted_drone_need)?;
    writeln!(out, "  Doctors:    {}", output.predicted_doctor_need)?;
    writeln!(out)?;
    writeln!(out, "{}", "Justification".bold())?;
    writeln!(out, "  {}", output.justification)
}

pub fn pickups(out: &mut impl Write, found: &[&PickupLocation]) -> io::Result<()> {
    if found.is_empty() {
        return hint(out, "No locations found.");
    }
    for location in found {
        writeln!(out, "{}", location.name.bold())?;
        hint(out, &location.summary())?;
        writeln!(out, "  Available: {}", location.medicines.join(", "))?;
    }
    Ok(())
}

pub fn map(out: &mut impl Write, view: &MapView, url: &str) -> io::Result<()> {
    writeln!(out, "{}", "Map".bold())?;
    writeln!(out, "  Centre: {}", view.center())?;
    writeln!(out, "  Zoom:   {}", view.zoom())?;
    for marker in view.markers() {
        writeln!(out, "  {} {} ({})", "•".bright_red(), marker.name, marker.position)?;
    }
    writeln!(out, "  {}", url)
}
