//! Demo: load a prefab, simulate it for a number of frames and export a GLB
//!
//! Usage: `prefab_engine <prefab.json> [out.glb] [frames] [config.ron]`

use std::process::ExitCode;

use prefab_engine::events::Subscription;
use prefab_engine::prelude::*;

fn log_contacts<E>(bus: &EventBus) -> Subscription
where
    E: EventKind<Payload = ContactEvent> + 'static,
{
    bus.on_event::<E, _>(|event: &ContactEvent| {
        log::info!(
            "{}: {} -> {}",
            E::NAME,
            event.source_entity_id,
            event.target_entity_id
        );
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(prefab_path) = args.next() else {
        return Err("usage: prefab_engine <prefab.json> [out.glb] [frames] [config.ron]".into());
    };
    let out_path = args.next().unwrap_or_else(|| String::from("scene.glb"));
    let frames: u32 = args.next().map(|f| f.parse()).transpose()?.unwrap_or(120);
    let config = match args.next() {
        Some(path) => SceneConfig::load_ron(path)?,
        None => SceneConfig::default(),
    };

    let prefab = Prefab::load_json(&prefab_path)?;
    log::info!(
        "Loaded prefab '{}' ({} nodes)",
        prefab.name.as_deref().unwrap_or(&prefab_path),
        prefab.node_count()
    );

    let mut ctx = SceneContext::init(&config);
    let subscriptions = [
        log_contacts::<CollisionEnter>(ctx.bus()),
        log_contacts::<CollisionExit>(ctx.bus()),
        log_contacts::<SensorEnter>(ctx.bus()),
        log_contacts::<SensorExit>(ctx.bus()),
    ];

    let assets = DirectoryAssets::new(&config.asset_root);
    let dt = config.fixed_timestep;
    let mut runtime = SceneRuntime::new(&ctx, config, prefab.root);
    for warning in runtime.scene().warnings() {
        log::warn!("{warning}");
    }

    let mut events = 0;
    for _ in 0..frames {
        let report = runtime.tick(&ctx, dt);
        if !report.sync.is_empty() {
            log::debug!("Frame {}: {:?}", report.frame, report.sync);
        }
        events += report.events;
    }
    log::info!(
        "Simulated {frames} frames, {} bodies, {events} contact events",
        runtime.physics().body_count()
    );

    let export = pollster::block_on(runtime.export(&assets))?;
    std::fs::write(&out_path, &export.data)?;
    log::info!(
        "Wrote {out_path} ({} bytes, {} warnings)",
        export.data.len(),
        export.warnings.len()
    );

    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    ctx.teardown();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
