use std::time::Instant;

use calico_mc::{
    BuchiAutomaton, CheckConfig, CountValue, EdgeCond, GammaQuery, NdfsChecker, Verdict,
};
use calico_net::{ArcSpec, CmpOp, ColoredPetriNet, NetBuilder, ParamColor};

fn count_atom(place: u32, op: CmpOp, rhs: u64) -> GammaQuery {
    GammaQuery::Compare {
        op,
        lhs: CountValue::Place(place),
        rhs: CountValue::Constant(rhs),
    }
}

fn ring_net(colors: u32) -> ColoredPetriNet {
    let mut b = NetBuilder::new();
    let p = b.add_place("ring", &[colors]).unwrap();
    let x = b.add_variable(colors).unwrap();
    let t = b.add_transition("step", None).unwrap();
    b.add_input_arc(t, p, ArcSpec::sequence(vec![ParamColor::variable(x, colors)]))
        .unwrap();
    b.add_output_arc(
        t,
        p,
        ArcSpec::sequence(vec![ParamColor::variable(x, colors).with_offset(1)]),
    )
    .unwrap();
    b.set_initial(p, [(0, 1)]).unwrap();
    b.build().unwrap()
}

fn check(net: &ColoredPetriNet, automaton: &BuchiAutomaton, config: &CheckConfig) -> Verdict {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    NdfsChecker::new(net, automaton, config).run().verdict
}

#[test]
fn reachable_accepting_self_loop_is_a_counterexample() {
    let net = ring_net(2);
    // Accepts everything: any reachable accepting state loops forever.
    let mut automaton = BuchiAutomaton::new(Vec::new());
    let a = automaton.add_state(false);
    let b = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::True, b);
    automaton.add_edge(b, EdgeCond::True, b);
    automaton.set_initial(a);

    assert_eq!(
        check(&net, &automaton, &CheckConfig::default()),
        Verdict::NotSatisfied
    );
}

#[test]
fn unreachable_accepting_state_clears_the_automaton() {
    let net = ring_net(3);
    // The guard atom never holds, so the accepting state is never
    // entered and no accepting cycle exists.
    let mut automaton = BuchiAutomaton::new(vec![count_atom(0, CmpOp::Ge, 5)]);
    let a = automaton.add_state(false);
    let b = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::not_ap(0), a);
    automaton.add_edge(a, EdgeCond::ap(0), b);
    automaton.add_edge(b, EdgeCond::True, b);
    automaton.set_initial(a);

    assert_eq!(
        check(&net, &automaton, &CheckConfig::default()),
        Verdict::Satisfied
    );
}

#[test]
fn conditional_cycle_is_found_by_the_inner_search() {
    let net = ring_net(2);
    // The self loop is conditional on the atom, so the shortcut does not
    // apply; the nested search must close the cycle through the ring.
    let mut automaton = BuchiAutomaton::new(vec![count_atom(0, CmpOp::Ge, 1)]);
    let a = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::ap(0), a);
    automaton.set_initial(a);

    assert_eq!(
        check(&net, &automaton, &CheckConfig::default()),
        Verdict::NotSatisfied
    );
}

#[test]
fn deadlocked_net_stutters_into_acceptance() {
    let mut b = NetBuilder::new();
    let p = b.add_place("p", &[1]).unwrap();
    let t = b.add_transition("t", None).unwrap();
    b.add_input_arc(t, p, ArcSpec::constant([(0, 2)])).unwrap();
    b.set_initial(p, [(0, 1)]).unwrap();
    let net = b.build().unwrap();

    let mut automaton = BuchiAutomaton::new(Vec::new());
    let a = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::True, a);
    automaton.set_initial(a);

    // The marking never moves, but stuttering extends the run and the
    // accepting loop closes.
    assert_eq!(
        check(&net, &automaton, &CheckConfig::default()),
        Verdict::NotSatisfied
    );
}

#[test]
fn no_initial_edge_means_no_run_at_all() {
    let net = ring_net(2);
    let mut automaton = BuchiAutomaton::new(vec![count_atom(0, CmpOp::Ge, 5)]);
    let a = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::ap(0), a);
    automaton.set_initial(a);

    assert_eq!(
        check(&net, &automaton, &CheckConfig::default()),
        Verdict::Satisfied
    );
}

#[test]
fn expired_deadline_yields_unknown() {
    let net = ring_net(4096);
    let mut automaton = BuchiAutomaton::new(vec![count_atom(0, CmpOp::Ge, 5)]);
    let a = automaton.add_state(false);
    let b = automaton.add_state(true);
    automaton.add_edge(a, EdgeCond::not_ap(0), a);
    automaton.add_edge(a, EdgeCond::ap(0), b);
    automaton.add_edge(b, EdgeCond::True, b);
    automaton.set_initial(a);

    let config = CheckConfig {
        deadline: Some(Instant::now()),
        ..CheckConfig::default()
    };
    assert_eq!(check(&net, &automaton, &config), Verdict::Unknown);
}
