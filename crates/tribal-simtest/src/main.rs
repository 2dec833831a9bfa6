//! TribalWars Headless Economy Harness
//!
//! Validates the village economy without SpacetimeDB: production, the cost
//! curve, the ledger, village caps, and a full service scenario on the
//! in-memory repository with a manual clock.
//!
//! Usage:
//!   cargo run -p tribal-simtest
//!   cargo run -p tribal-simtest -- --verbose
//!   cargo run -p tribal-simtest -- --config economy.json

use std::sync::{Barrier, Mutex};
use std::thread;

use tribal_logic::clock::{ManualClock, Timestamp};
use tribal_logic::config::EconomyConfig;
use tribal_logic::costs::{recruitment_cost, upgrade_cost};
use tribal_logic::kinds::{BuildingType, ResourceKind, UnitType};
use tribal_logic::ledger::ResourceStock;
use tribal_logic::limits::{check_village_limit, max_villages, OwnerSummary};
use tribal_logic::memory::MemoryRepository;
use tribal_logic::production::{production_over, production_rate, BuildingLevels};
use tribal_logic::repository::OwnerId;
use tribal_logic::resources::Resources;
use tribal_logic::{EconomyError, EconomyService};

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

const START_SECS: i64 = 1_700_000_000;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    println!("=== TribalWars Economy Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(detail) => {
            println!("  ✗ config_load: {}", detail);
            std::process::exit(1);
        }
    };
    results.extend(validate_config(&config, verbose));

    // 2. Production
    results.extend(validate_production(&config, verbose));

    // 3. Cost curve
    results.extend(validate_costs(verbose));

    // 4. Resource ledger
    results.extend(validate_ledger(&config, verbose));

    // 5. Village limits
    results.extend(validate_limits(&config, verbose));

    // 6. Service scenario
    results.extend(validate_service(&config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn load_config(args: &[String]) -> Result<EconomyConfig, String> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(EconomyConfig::default());
    };
    let path = args
        .get(pos + 1)
        .ok_or_else(|| "--config needs a path".to_string())?;
    let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
    EconomyConfig::from_json(&json).map_err(|e| format!("{}: {}", path, e))
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(config: &EconomyConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "config_valid".into(),
        passed: config.validate().is_ok(),
        detail: format!(
            "{} per level per minute, {} townhall levels per village",
            config.production_per_level, config.townhall_levels_per_village
        ),
    });

    // Serialized form loads back unchanged
    let reloaded = serde_json::to_string(config)
        .map_err(|e| e.to_string())
        .and_then(|json| EconomyConfig::from_json(&json).map_err(|e| e.to_string()));
    results.push(TestResult {
        name: "config_json_stable".into(),
        passed: reloaded.as_ref() == Ok(config),
        detail: match &reloaded {
            Ok(_) => "config survives JSON".into(),
            Err(e) => format!("reload failed: {}", e),
        },
    });

    if verbose {
        if let Ok(json) = serde_json::to_string_pretty(config) {
            println!("  Active config:\n{}", json);
        }
    }

    results
}

// ── 2. Production ───────────────────────────────────────────────────────

fn validate_production(config: &EconomyConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Production ---");
    let mut results = Vec::new();
    let per_level = config.production_per_level;

    // Each resource is produced only by its own building
    for kind in ResourceKind::all() {
        let levels: BuildingLevels = [(kind.producer(), 3)].into_iter().collect();
        let out = production_over(&levels, 10, per_level);
        let own = out.get(*kind);
        let others: u64 = ResourceKind::all()
            .iter()
            .filter(|k| *k != kind)
            .map(|k| out.get(*k))
            .sum();
        results.push(TestResult {
            name: format!("production_{}_isolated", kind),
            passed: own == per_level * 30 && others == 0,
            detail: format!("{} level 3 for 10 min: {}", kind.producer(), out),
        });
    }

    // Non-producers never add resources
    let mut levels = BuildingLevels::new();
    for b in BuildingType::all().iter().filter(|b| b.produces().is_none()) {
        levels.set(*b, 30);
    }
    results.push(TestResult {
        name: "production_non_producers_idle".into(),
        passed: production_over(&levels, 1_000, per_level).is_zero(),
        detail: "townhall, warehouse and barracks produce nothing".into(),
    });

    // Output is linear in time
    let levels = BuildingLevels::uniform(4);
    let one = production_rate(&levels, per_level);
    let sixty = production_over(&levels, 60, per_level);
    results.push(TestResult {
        name: "production_linear".into(),
        passed: sixty == one.saturating_mul(60),
        detail: format!("1 min {} / 60 min {}", one, sixty),
    });

    if verbose {
        println!("  Per-minute output by level:");
        for level in [1, 5, 10, 20, 30] {
            let rate = production_rate(&BuildingLevels::uniform(level), per_level);
            println!("    level {:2}: {}", level, rate);
        }
    }

    results
}

// ── 3. Cost Curve ───────────────────────────────────────────────────────

fn validate_costs(verbose: bool) -> Vec<TestResult> {
    println!("--- Cost Curve ---");
    let mut results = Vec::new();

    // Monotonic per building over a long sweep
    for building in BuildingType::all() {
        if building.base_cost().is_none() {
            results.push(TestResult {
                name: format!("cost_{}_unsupported", building),
                passed: upgrade_cost(*building, 2).is_none(),
                detail: "no upgrade price".into(),
            });
            continue;
        }
        let mut decreasing = Vec::new();
        let mut previous = Resources::ZERO;
        for level in 2..=60 {
            let Some(cost) = upgrade_cost(*building, level) else {
                decreasing.push(level);
                continue;
            };
            if !cost.covers(&previous) {
                decreasing.push(level);
            }
            previous = cost;
        }
        results.push(TestResult {
            name: format!("cost_{}_monotonic", building),
            passed: decreasing.is_empty(),
            detail: if decreasing.is_empty() {
                "non-decreasing over levels 2-60".into()
            } else {
                format!("drops at levels {:?}", decreasing)
            },
        });
    }

    // Fixed points on the ×2.5 curve
    let lvl3 = upgrade_cost(BuildingType::Lumbermill, 3);
    results.push(TestResult {
        name: "cost_lumbermill_level3".into(),
        passed: lvl3 == Some(Resources::new(312, 312, 125)),
        detail: format!("{:?}", lvl3),
    });

    let far = upgrade_cost(BuildingType::Barracks, 1_000);
    results.push(TestResult {
        name: "cost_saturates".into(),
        passed: far == Some(Resources::new(u64::MAX, u64::MAX, u64::MAX)),
        detail: "level 1000 saturates instead of overflowing".into(),
    });

    // Recruitment scales linearly
    for unit in UnitType::all() {
        let ten = recruitment_cost(*unit, 10);
        results.push(TestResult {
            name: format!("cost_{}_linear", unit),
            passed: ten == unit.unit_cost().saturating_mul(10),
            detail: format!("10 × {} = {}", unit, ten),
        });
    }

    if verbose {
        println!("  Upgrade costs:");
        for building in BuildingType::all().iter().filter(|b| b.base_cost().is_some()) {
            for level in [2, 5, 10] {
                if let Some(cost) = upgrade_cost(*building, level) {
                    println!("    {:10} -> {:2}: {}", building, level, cost);
                }
            }
        }
    }

    results
}

// ── 4. Resource Ledger ──────────────────────────────────────────────────

fn validate_ledger(config: &EconomyConfig, _verbose: bool) -> Vec<TestResult> {
    println!("--- Resource Ledger ---");
    let mut results = Vec::new();
    let per_level = config.production_per_level;
    let levels = BuildingLevels::uniform(2);
    let start = Timestamp::from_secs(START_SECS);

    // Sub-minute refreshes never accrue, however many there are
    let mut stock = ResourceStock::new(Resources::ZERO, start);
    for s in 1..60 {
        stock.refresh(&levels, start.plus_secs(s), per_level);
    }
    results.push(TestResult {
        name: "ledger_sub_minute_idle".into(),
        passed: stock.resources.is_zero() && stock.last_accrued_at == start,
        detail: format!("59 refreshes within a minute: {}", stock.resources),
    });

    // Going back in time is a no-op
    let mut stock = ResourceStock::new(Resources::new(7, 7, 7), start);
    stock.refresh(&levels, start.plus_secs(-3_600), per_level);
    results.push(TestResult {
        name: "ledger_clock_skew_ignored".into(),
        passed: stock == ResourceStock::new(Resources::new(7, 7, 7), start),
        detail: "refresh with an earlier time changes nothing".into(),
    });

    // A failed debit leaves the stock untouched, refresh included
    let mut stock = ResourceStock::new(Resources::new(10, 10, 0), start);
    let before = stock;
    let shortfall = stock.try_debit(
        &Resources::new(5, 5, 1_000),
        &levels,
        start.plus_secs(120),
        per_level,
    );
    let expected_short = 1_000u64.saturating_sub(4 * per_level);
    results.push(TestResult {
        name: "ledger_debit_all_or_nothing".into(),
        passed: stock == before && shortfall == Err(Resources::new(0, 0, expected_short)),
        detail: format!("shortfall {:?}", shortfall),
    });

    results
}

// ── 5. Village Limits ───────────────────────────────────────────────────

fn validate_limits(config: &EconomyConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Village Limits ---");
    let mut results = Vec::new();
    let per = config.townhall_levels_per_village;

    // Cap never shrinks as the townhall grows
    let shrinking: Vec<u32> = (1..=100)
        .filter(|h| max_villages(*h, per) < max_villages(h - 1, per))
        .collect();
    results.push(TestResult {
        name: "limit_monotonic".into(),
        passed: shrinking.is_empty(),
        detail: format!("cap at townhall 100: {}", max_villages(100, per)),
    });

    // Owners with no villages may always found one
    let fresh = check_village_limit(&OwnerSummary::default(), per);
    results.push(TestResult {
        name: "limit_first_village".into(),
        passed: fresh == Ok(1),
        detail: format!("{:?}", fresh),
    });

    // At the cap, founding is refused with the cap reported
    let highest_townhall = per.saturating_mul(2);
    let at_cap = OwnerSummary {
        village_count: max_villages(highest_townhall, per),
        highest_townhall,
    };
    let refused = check_village_limit(&at_cap, per);
    results.push(TestResult {
        name: "limit_refused_at_cap".into(),
        passed: matches!(refused, Err(EconomyError::VillageLimitExceeded { limit, current })
            if limit == at_cap.village_count && current == at_cap.village_count),
        detail: format!("{:?}", refused),
    });

    if verbose {
        for h in [0, 9, 10, 17, 20, 30] {
            println!("    townhall {:2}: {} villages", h, max_villages(h, per));
        }
    }

    results
}

// ── 6. Service Scenario ─────────────────────────────────────────────────

fn validate_service(config: &EconomyConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Service Scenario ---");
    let mut results = Vec::new();

    let repo = MemoryRepository::new();
    let clock = ManualClock::new(Timestamp::from_secs(START_SECS));
    let svc = EconomyService::new(&repo, &clock, config.clone());
    let owner = OwnerId::new("simtest");

    let village = match svc.found_starting_village(&owner) {
        Ok(Some(v)) => v,
        other => {
            results.push(TestResult {
                name: "service_starting_village".into(),
                passed: false,
                detail: format!("{:?}", other),
            });
            return results;
        }
    };
    results.push(TestResult {
        name: "service_starting_village".into(),
        passed: village.name == config.starting_village_name.trim(),
        detail: format!("village {} {:?}", village.id, village.name),
    });

    let again = svc.found_starting_village(&owner);
    results.push(TestResult {
        name: "service_starting_village_once".into(),
        passed: matches!(again, Ok(None)),
        detail: format!("{:?}", again),
    });

    // An hour of production at level 1 everywhere
    clock.advance_secs(3_600);
    let report = svc.get_resources(&owner, village.id);
    let expected = config
        .starting_resources
        .saturating_add(&production_over(&BuildingLevels::uniform(1), 60, config.production_per_level));
    results.push(TestResult {
        name: "service_hour_of_production".into(),
        passed: report.as_ref().map(|r| r.resources) == Ok(expected),
        detail: format!("{:?}", report.as_ref().map(|r| r.resources)),
    });
    if verbose {
        if let Ok(json) = report.as_ref().map(serde_json::to_string) {
            println!("  Report: {}", json.unwrap_or_default());
        }
    }

    // Two racing upgrades on a stock that pays for exactly one
    let cost = upgrade_cost(BuildingType::Ironmine, 2).unwrap_or(Resources::ZERO);
    let seeded = repo.edit(village.id, |r| r.stock.resources = cost);
    let barrier = Barrier::new(2);
    let outcomes = Mutex::new(Vec::new());
    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                barrier.wait();
                let r = svc.upgrade_building(&owner, village.id, BuildingType::Ironmine);
                if let Ok(mut outcomes) = outcomes.lock() {
                    outcomes.push(r.is_ok());
                }
            });
        }
    });
    let wins = outcomes
        .into_inner()
        .map(|o| o.iter().filter(|ok| **ok).count())
        .unwrap_or(0);
    let after = repo.snapshot(village.id).ok().flatten();
    results.push(TestResult {
        name: "service_no_double_spend".into(),
        passed: seeded == Ok(true)
            && wins == 1
            && after.as_ref().map(|r| r.stock.resources) == Some(Resources::ZERO)
            && after.as_ref().and_then(|r| r.buildings.get(BuildingType::Ironmine)) == Some(2),
        detail: format!("{} of 2 upgrades succeeded", wins),
    });

    // Foreign owners see nothing
    let stranger = OwnerId::new("stranger");
    let foreign = svc.get_resources(&stranger, village.id);
    results.push(TestResult {
        name: "service_foreign_forbidden".into(),
        passed: foreign == Err(EconomyError::Forbidden),
        detail: format!("{:?}", foreign.map(|r| r.village)),
    });

    // Recruiting beyond the stock is refused without side effects
    let before = repo.snapshot(village.id).ok().flatten();
    let recruit = svc.recruit_units(&owner, village.id, UnitType::Swordsman, 1_000);
    let unchanged = repo.snapshot(village.id).ok().flatten() == before;
    results.push(TestResult {
        name: "service_recruit_refused".into(),
        passed: matches!(recruit, Err(EconomyError::InsufficientResources { .. })) && unchanged,
        detail: format!("{:?}", recruit.map(|r| r.new_count)),
    });

    // A second village needs a bigger townhall
    let second = svc.create_village(&owner, "Outpost");
    results.push(TestResult {
        name: "service_cap_enforced".into(),
        passed: matches!(second, Err(EconomyError::VillageLimitExceeded { limit: 1, current: 1 })),
        detail: format!("{:?}", second.map(|c| c.village.id)),
    });

    results
}
