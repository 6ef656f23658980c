//! Demo that walks a board through a few edits and prints the table after each.
//!
//! Usage: balance_demo [criteria] [seed]

use criteria_weight_balancer::{render, BalancerConfig, Board};
use rand::{rngs::StdRng, SeedableRng};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = BalancerConfig::load()?;
    let mut args = std::env::args().skip(1);
    let n = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(cfg.default_criteria);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = Board::generate(n, &cfg, &mut rng);
    println!("== fresh board\n{}", render::table(&board.view()));

    match board.toggle_lock(0, &cfg) {
        Ok(change) => println!("== lock row 1: {change:?}"),
        Err(e) => println!("== lock row 1 refused: {e}"),
    }
    board.set_weight(1, 6.5, &cfg)?;
    println!("== row 2 weight -> 6.5\n{}", render::table(&board.view()));

    // Second lock then an over-commit attempt on the remaining rows.
    for i in 1..board.len() {
        match board.toggle_lock(i, &cfg) {
            Ok(change) => println!("== lock {}: {change:?}", Board::name(i)),
            Err(e) => {
                println!("== lock {} refused: {e}", Board::name(i));
                break;
            }
        }
    }
    println!("{}", render::table(&board.view()));

    board.reset_locks();
    println!("== locks reset\n{}", render::table(&board.view()));
    Ok(())
}
