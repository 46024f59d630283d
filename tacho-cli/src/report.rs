//! Text and JSON report output

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tacho_decoder::compliance::ComplianceReport;
use tacho_decoder::types::TachographFile;

/// Print the decoded-file summary to stdout.
pub fn print_summary(path: &Path, file: &TachographFile) {
    println!("═══════════════════════════════════════════════");
    println!("  Tachograph File Summary");
    println!("═══════════════════════════════════════════════");
    println!("File:        {}", path.display());
    if let Some(generation) = file.generation {
        println!("Generation:  {}", generation);
    }

    let driver = &file.driver;
    if !driver.surname.is_empty() || !driver.card_number.is_empty() {
        println!("\nDriver:");
        println!("  Name:         {} {}", driver.first_names, driver.surname);
        println!("  Card number:  {}", driver.card_number);
        println!("  Issued by:    {} ({})", driver.card_issuing_authority, driver.issuing_nation);
        if let Some(birth) = driver.birth_date {
            println!("  Born:         {}", birth);
        }
        if let Some(expiry) = driver.card_expiry {
            println!("  Card expiry:  {}", expiry.date_naive());
        }
        if let Some(licence) = &driver.licence {
            println!("  Licence:      {} ({})", licence.number, licence.nation);
        }
    }

    if !file.vehicles_used.is_empty() {
        println!("\nVehicles used:");
        for vehicle in &file.vehicles_used {
            let distance = match (vehicle.odometer_begin_km, vehicle.odometer_end_km) {
                (Some(begin), Some(end)) if end >= begin => format!("{} km", end - begin),
                _ => "-".to_string(),
            };
            println!(
                "  {:<14} {:<4} {:<12} {}",
                vehicle.plate,
                vehicle.nation,
                vehicle
                    .first_use
                    .map(|ts| ts.date_naive().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                distance
            );
        }
    }

    println!("\nRecords:");
    println!("  Activity days:   {}", file.activities.len());
    println!("  Timeline spans:  {}", file.timeline.len());
    println!("  Events:          {}", file.events.len());
    println!("  Faults:          {}", file.faults.len());
    println!("  Places:          {}", file.places.len());
    println!("  GNSS points:     {}", file.gnss_points.len());
    println!("  Calibrations:    {}", file.calibration_records.len());
    println!("  Signatures:      {}", file.signature_blocks.len());
    if !file.raw_unparsed.is_empty() {
        println!("  Raw unparsed:    {}", file.raw_unparsed.len());
    }
    for warning in &file.warnings {
        println!("  ⚠ {:?}: {}", warning.kind, warning.detail);
    }
}

/// Print the compliance findings and weekly aggregates.
pub fn print_compliance(report: &ComplianceReport) {
    println!("\n═══════════════════════════════════════════════");
    println!("  EU 561/2006 Compliance");
    println!("═══════════════════════════════════════════════");

    if report.weeks.is_empty() {
        println!("No activity to evaluate.");
        return;
    }

    println!("\nWeeks:");
    println!("  {:<12} {:>9} {:>9} {:>7} {:>7}", "Monday", "driving", "km", "breaks", "shifts");
    for week in &report.weeks {
        println!(
            "  {:<12} {:>6}h{:02} {:>9} {:>7} {:>7}",
            week.week_start,
            week.driving_minutes / 60,
            week.driving_minutes % 60,
            week.distance_km,
            week.breaks,
            week.shifts
        );
    }

    if report.infractions.is_empty() {
        println!("\n✓ No infractions found.");
    } else {
        println!("\nInfractions:");
        for infraction in &report.infractions {
            println!(
                "  {} [{:>3}] {:<32} {}",
                infraction.date,
                infraction.severity,
                infraction.category.code(),
                infraction.description
            );
        }
    }
}

/// Write the decoded result (and analysis, when present) as JSON.
pub fn write_json(
    path: &Path,
    file: &TachographFile,
    analysis: Option<&ComplianceReport>,
) -> Result<()> {
    let document = json!({
        "file": file,
        "compliance": analysis,
    });
    let text = serde_json::to_string_pretty(&document)?;
    if path.as_os_str() == "-" {
        println!("{}", text);
    } else {
        std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
        log::info!("JSON result written to {:?}", path);
    }
    Ok(())
}
