use std::time::Instant;

use crate::advisor::{Advisor, AdvisorSettings, PlacementModel};
use crate::analyze::analyze;
use crate::config::Config;
use crate::error::Error;
use crate::execute::{ExecuteOptions, execute};
use crate::extract::extract_images;
use crate::report::RunSummary;
use crate::verify::verify;

/// Extract, analyze, advise, execute and verify, in that order.
pub fn run(config: &Config, model: &dyn PlacementModel) -> Result<RunSummary, Error> {
    let t0 = Instant::now();

    std::fs::create_dir_all(&config.temp_dir)?;
    let workdir = tempfile::Builder::new()
        .prefix("docx-place-")
        .tempdir_in(&config.temp_dir)?;

    let assets = extract_images(&config.source_path, workdir.path())?;
    let t_extract = t0.elapsed();

    let structure = analyze(&config.target_path)?;
    let t_analyze = t0.elapsed();

    let advice = Advisor::new(model, AdvisorSettings::from(config)).advise(&structure, &assets)?;
    let t_advise = t0.elapsed();

    let options = ExecuteOptions::from_config(config);
    let execution = execute(
        &config.target_path,
        &structure,
        &advice.plan,
        &assets,
        &options,
    )?;
    let t_execute = t0.elapsed();

    let verification = verify(&execution.output_path, &structure, &execution);
    let t_total = t0.elapsed();

    log::info!(
        "Timing: extract={:.1}ms, analyze={:.1}ms, advise={:.1}ms, execute={:.1}ms, verify={:.1}ms, total={:.1}ms",
        t_extract.as_secs_f64() * 1000.0,
        (t_analyze - t_extract).as_secs_f64() * 1000.0,
        (t_advise - t_analyze).as_secs_f64() * 1000.0,
        (t_execute - t_advise).as_secs_f64() * 1000.0,
        (t_total - t_execute).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
    );

    let temp_dir = if config.keep_temp {
        let kept = workdir.keep();
        log::info!("Keeping extracted images in {}", kept.display());
        Some(kept)
    } else {
        None
    };

    Ok(RunSummary::new(
        &assets,
        advice,
        execution,
        verification,
        temp_dir,
    ))
}
