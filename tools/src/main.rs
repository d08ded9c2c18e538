//! harbor-runner: headless driver for the harbor simulation.
//!
//! Usage:
//!   harbor-runner --data-dir ./data --db harbor.db --seconds 120 --dt 0.05
//!   harbor-runner --db harbor.db --ipc-mode

use anyhow::Result;
use chrono::Utc;
use harbor_core::{
    command::PlayerCommand,
    config::{BuildingKindTag, GameConfig},
    engine::SimEngine,
    format::compact,
    nav::LinearNavigator,
    store::SaveStore,
    types::{Amount, EntityId, Seconds, Tick},
    villager::Activity,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        seconds: Seconds,
    },
    Command {
        command: PlayerCommand,
    },
    Save,
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    tick:              Tick,
    game_time:         Seconds,
    paused:            bool,
    gold:              Amount,
    gold_label:        String,
    fish:              Amount,
    max_fish_capacity: Amount,
    selected_villager: Option<EntityId>,
    buildings:         Vec<BuildingView>,
    villagers:         Vec<VillagerView>,
}

#[derive(serde::Serialize)]
struct BuildingView {
    id:            EntityId,
    name:          String,
    kind:          BuildingKindTag,
    built:         bool,
    level:         u32,
    max_level:     u32,
    working:       bool,
    occupant:      Option<EntityId>,
    cycle_label:   &'static str,
    cycle_seconds: Seconds,
    amount_label:  &'static str,
    amount:        Amount,
    build_cost:    Amount,
    upgrade_cost:  Amount,
}

#[derive(serde::Serialize)]
struct VillagerView {
    id:        EntityId,
    house_id:  EntityId,
    workplace: Option<EntityId>,
    carried:   Amount,
    capacity:  Amount,
    activity:  Activity,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seconds = parse_arg(&args, "--seconds", 120.0f64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let config = GameConfig::load(data_dir)?;
    let dt = parse_arg(&args, "--dt", config.balance.engine.frame_seconds);
    let slot = config.balance.engine.save_slot.clone();

    if !ipc_mode {
        println!("Harbor: harbor-runner");
        println!("  seconds:   {seconds}");
        println!("  dt:        {dt}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = if db == ":memory:" { SaveStore::in_memory()? } else { SaveStore::open(db)? };
    store.migrate()?;

    let run_id = format!("run-{}", Utc::now().format("%Y%m%d%H%M%S"));
    let mut engine = SimEngine::new(run_id.clone(), config, Rc::new(LinearNavigator::new()))?;
    engine.attach_store(store)?;

    let offline = engine.load(&slot, Utc::now())?;
    if offline.total_gold > 0 && !ipc_mode {
        println!(
            "Welcome back! {:.0}s away earned {} gold",
            offline.capped_seconds,
            compact(offline.total_gold)
        );
    }

    if ipc_mode {
        run_ipc_loop(&mut engine, &slot, dt)?;
    } else {
        stage_demo(&mut engine)?;
        engine.run_for(seconds, dt)?;
        print_summary(&engine, &run_id, seconds);
    }

    engine.save(&slot, Utc::now())?;
    Ok(())
}

/// Make sure there is something to watch: a boat, a house, a lighthouse and
/// a villager at work.
fn stage_demo(engine: &mut SimEngine) -> Result<()> {
    let boat = first_of(engine, BuildingKindTag::Boat);
    let house = first_of(engine, BuildingKindTag::VillagerHouse);
    let lighthouse = first_of(engine, BuildingKindTag::Lighthouse);

    for id in [&boat, &house, &lighthouse].into_iter().flatten() {
        if !engine.building(id)?.is_built() && !engine.build(id, false)? {
            log::warn!("not enough gold to build {id}");
        }
    }

    let Some(boat) = boat else { return Ok(()) };
    if !engine.building(&boat)?.is_built() || engine.building(&boat)?.is_occupied() {
        return Ok(());
    }
    let idle = engine
        .villagers()
        .iter()
        .find(|v| v.workplace().is_none())
        .map(|v| v.id().to_string());
    if let Some(villager) = idle {
        if let Err(err) = engine.assign(&villager, &boat) {
            log::warn!("could not assign {villager} to {boat}: {err}");
        }
    }
    engine.flush_events()?;
    Ok(())
}

fn first_of(engine: &SimEngine, kind: BuildingKindTag) -> Option<EntityId> {
    engine
        .buildings()
        .iter()
        .find(|b| b.tag() == kind)
        .map(|b| b.id().to_string())
}

fn run_ipc_loop(engine: &mut SimEngine, slot: &str, dt: Seconds) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Tick { seconds } => {
                engine.run_for(seconds, dt)?;
            }
            IpcCommand::GetState => {}
            IpcCommand::Command { command } => {
                engine.submit_command(command);
                // Commands apply at the start of a tick.
                engine.tick(0.0)?;
            }
            IpcCommand::Save => {
                engine.save(slot, Utc::now())?;
                engine.flush_events()?;
            }
        }
        writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(engine: &SimEngine) -> UiState {
    let ledger = engine.ledger();
    UiState {
        tick:              engine.clock.current_tick,
        game_time:         engine.clock.game_time,
        paused:            engine.clock.paused,
        gold:              ledger.gold(),
        gold_label:        compact(ledger.gold()),
        fish:              ledger.fish(),
        max_fish_capacity: ledger.max_fish_capacity(),
        selected_villager: engine.registry().selected().map(str::to_string),
        buildings: engine
            .buildings()
            .iter()
            .map(|b| BuildingView {
                id:            b.id().to_string(),
                name:          b.name().to_string(),
                kind:          b.tag(),
                built:         b.is_built(),
                level:         b.level(),
                max_level:     b.max_level(),
                working:       b.is_working(),
                occupant:      b.occupant().map(str::to_string),
                cycle_label:   b.cycle_label(),
                cycle_seconds: b.cycle_seconds(),
                amount_label:  b.amount_label(),
                amount:        b.yield_amount(),
                build_cost:    b.build_cost(),
                upgrade_cost:  b.upgrade_cost(),
            })
            .collect(),
        villagers: engine
            .villagers()
            .iter()
            .map(|v| VillagerView {
                id:        v.id().to_string(),
                house_id:  v.house_id().to_string(),
                workplace: v.workplace().map(str::to_string),
                carried:   v.carried(),
                capacity:  v.carry_capacity(),
                activity:  v.activity(),
            })
            .collect(),
    }
}

fn print_summary(engine: &SimEngine, run_id: &str, seconds: Seconds) {
    let ledger = engine.ledger();
    let logged = engine
        .store()
        .and_then(|s| s.event_count(run_id).ok())
        .unwrap_or(0);

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  seconds run:    {seconds}");
    println!("  final tick:     {}", engine.clock.current_tick);
    println!("  gold:           {}", compact(ledger.gold()));
    println!("  fish:           {} / {}", ledger.fish(), ledger.max_fish_capacity());
    println!("  events logged:  {logged}");

    println!();
    println!("=== BUILDINGS ===");
    for b in engine.buildings().iter().filter(|b| b.is_built()) {
        println!(
            "  {:<12} lvl {:>2} | {}: {:.2}s | {}: {}{}",
            b.id(),
            b.level(),
            b.cycle_label(),
            b.cycle_seconds(),
            b.amount_label(),
            compact(b.yield_amount()),
            b.occupant().map(|o| format!(" | worker {o}")).unwrap_or_default(),
        );
    }

    println!();
    println!("=== VILLAGERS ===");
    if engine.villagers().is_empty() {
        println!("  (No villagers yet)");
    }
    for v in engine.villagers() {
        println!(
            "  {} | {:?} | carrying {}/{}",
            v.id(),
            v.activity(),
            v.carried(),
            v.carry_capacity()
        );
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
