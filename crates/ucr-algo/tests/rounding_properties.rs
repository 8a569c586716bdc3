//! Properties of the reserve-aware rounding over a small reserve-carrying
//! cluster.

use ucr_algo::cluster::{ClusterHourContext, ReserveHourParams};
use ucr_algo::reserve::ClusterTargets;
use ucr_algo::{
    allocate_offline, round_cluster, ClusterView, HeuristicConfig, HeuristicMode, OfflinePolicy,
    RoundingPolicy, SolverParameters,
};
use ucr_core::{
    params, ClusterSpec, FractionalGuide, IntegerSchedule, Network, NodeSpec, ParameterStore,
    ReserveCategory, ReserveKind, TimeBlock,
};

const PRIMARY_UP: ReserveKind = ReserveKind::up(ReserveCategory::Primary);
const TERTIARY_UP: ReserveKind = ReserveKind::up(ReserveCategory::Tertiary1);

const GUIDE: [f64; 6] = [1.2, 2.0, 2.7, 3.5, 0.4, 4.0];
const ENERGY: [f64; 6] = [110.0, 190.0, 260.0, 330.0, 30.0, 390.0];

fn view() -> ClusterView {
    let network = Network::new()
        .with_node(NodeSpec::new("N").with_reserve(PRIMARY_UP).with_reserve(TERTIARY_UP))
        .with_cluster(
            ClusterSpec::new("G", "N")
                .with_reserve(PRIMARY_UP)
                .with_reserve(TERTIARY_UP),
        );

    let mut store = ParameterStore::new();
    store.add_data("N", params::DEMAND, 0.0);
    store.add_data("N", params::UNSUPPLIED_ENERGY_COST, 3000.0);
    store.add_data("N", params::SPILLAGE_COST, 1.0);
    for kind in [PRIMARY_UP, TERTIARY_UP] {
        store.add_data("N", kind.param(params::RESERVE_DEMAND), 0.0);
        store.add_data("N", kind.param(params::OVERSUPPLY_COST), 0.0);
        store.add_data("G", kind.param(params::MAX_ON), 20.0);
        store.add_data("G", kind.param(params::MAX_OFF), 100.0);
        store.add_data("G", kind.param(params::COST_ON), 1.0);
        store.add_data("G", kind.param(params::COST_OFF), 2.0);
    }
    store.add_data("N", PRIMARY_UP.param(params::NON_SUPPLY_COST), 800.0);
    store.add_data("N", TERTIARY_UP.param(params::NON_SUPPLY_COST), 400.0);
    for (name, value) in [
        (params::P_MAX, 100.0),
        (params::P_MIN, 30.0),
        (params::COST, 20.0),
        (params::STARTUP_COST, 150.0),
        (params::FIXED_COST, 10.0),
        (params::NB_UNITS_MIN, 0.0),
        (params::NB_UNITS_MAX, 5.0),
        (params::D_MIN_UP, 1.0),
        (params::D_MIN_DOWN, 1.0),
    ] {
        store.add_data("G", name, value);
    }
    ClusterView::load(&network, &store, "G", &TimeBlock::new(0, 0..GUIDE.len()), 0).unwrap()
}

fn targets() -> ClusterTargets {
    ClusterTargets {
        energy: ENERGY.to_vec(),
        reserves: vec![vec![60.0; GUIDE.len()], vec![150.0; GUIDE.len()]],
    }
}

fn config(rounding_policy: RoundingPolicy, offline_policy: OfflinePolicy) -> HeuristicConfig {
    HeuristicConfig {
        mode: HeuristicMode::ReserveAware,
        rounding_policy,
        offline_policy,
        smoothing: true,
    }
}

fn round(guide: &[f64], config: &HeuristicConfig) -> IntegerSchedule {
    let guide = FractionalGuide::new(guide.to_vec()).expect("valid guide");
    round_cluster(&view(), &guide, &targets(), config, &SolverParameters::default())
        .expect("rounding succeeds")
        .0
}

#[test]
fn test_every_hour_is_floor_or_ceiling() {
    for rounding in [RoundingPolicy::Gain, RoundingPolicy::Neutral, RoundingPolicy::Loss] {
        let schedule = round(&GUIDE, &config(rounding, OfflinePolicy::default()));
        for (t, (&units, &g)) in schedule.nb_on.iter().zip(&GUIDE).enumerate() {
            let (floor, ceil) = (g.floor() as u32, g.ceil() as u32);
            assert!(
                units == floor || units == ceil,
                "{rounding:?} hour {t}: {units} not in {{{floor}, {ceil}}}"
            );
            if g.fract() == 0.0 {
                assert_eq!(units, g as u32, "{rounding:?} hour {t}");
            }
        }
    }
}

#[test]
fn test_unit_ceiling_holds_for_every_offline_policy() {
    for policy in OfflinePolicy::ALL {
        let schedule = round(&GUIDE, &config(RoundingPolicy::Gain, policy));
        schedule.check_ceiling(&[5.0; 6]).unwrap();
        for t in 0..GUIDE.len() {
            let total = schedule.nb_on[t] + schedule.off(PRIMARY_UP, t) + schedule.off(TERTIARY_UP, t);
            assert!(total <= 5, "{policy:?} hour {t}: {total} units");
        }
    }
}

#[test]
fn test_integer_guide_is_a_fixed_point() {
    for policy in OfflinePolicy::ALL {
        let config = config(RoundingPolicy::Gain, policy);
        let first = round(&GUIDE, &config);
        let guide: Vec<f64> = first.nb_on.iter().map(|&n| f64::from(n)).collect();
        let second = round(&guide, &config);
        assert_eq!(first, second, "{policy:?}");
    }
}

fn hour_context(primary_non_supply_cost: f64) -> ClusterHourContext {
    let reserve = |kind, non_supply_cost| ReserveHourParams {
        kind,
        max_on: 20.0,
        max_off: 100.0,
        cost_on: 1.0,
        cost_off: 2.0,
        non_supply_cost,
        oversupply_cost: 0.0,
        target: 200.0,
    };
    ClusterHourContext {
        step: 0,
        p_max: 100.0,
        p_min: 30.0,
        cost: 20.0,
        startup_cost: 150.0,
        fixed_cost: 10.0,
        unit_ceiling: 5.0,
        unsupplied_energy_cost: 3000.0,
        spillage_cost: 1.0,
        energy_target: 150.0,
        reserves: vec![
            reserve(PRIMARY_UP, primary_non_supply_cost),
            reserve(TERTIARY_UP, 100.0),
        ],
    }
}

#[test]
fn test_failure_cost_greedy_is_monotone_in_non_supply_cost() {
    // 2 + 2 units wanted, 3 spare once 2 are committed
    let needs = [200.0, 200.0];
    let mut previous = 0;
    for cost in [0.0, 50.0, 100.0, 150.0, 1000.0] {
        let counts = allocate_offline(
            OfflinePolicy::FailureCostGreedy,
            &hour_context(cost),
            2,
            &needs,
            &SolverParameters::default(),
        )
        .unwrap();
        assert_eq!(counts.iter().sum::<u32>(), 3);
        assert!(
            counts[0] >= previous,
            "non-supply cost {cost}: {} offline units after {previous}",
            counts[0]
        );
        previous = counts[0];
    }
    assert_eq!(previous, 2);
}

#[test]
fn test_single_kind_policies_agree() {
    let mut ctx = hour_context(500.0);
    ctx.reserves.truncate(1);
    let needs = [450.0];
    let counts: Vec<Vec<u32>> = OfflinePolicy::ALL
        .iter()
        .map(|&policy| {
            allocate_offline(policy, &ctx, 2, &needs, &SolverParameters::default()).unwrap()
        })
        .collect();
    for (policy, c) in OfflinePolicy::ALL.iter().zip(&counts) {
        assert_eq!(c, &vec![3], "{policy:?}");
    }
}
