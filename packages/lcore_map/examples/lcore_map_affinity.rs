//! Example that binds groups of logical cores to processors and prints the resulting table.
//!
//! The processors present are fixed so the output is the same on every host.

use lcore_map::{CoreOption, DetectedProcessors, configure};

fn main() {
    println!("=== lcore_map affinity example ===");

    let options = [
        CoreOption::Lcores("1,2@(5-7),(3-5)@(0,2),(0,6),7-8".to_string()),
        CoreOption::MasterLcore("0x3".to_string()),
    ];

    let config = configure(&options, &DetectedProcessors::first_n(16)).unwrap();

    println!("{config}");

    for lcore_id in config.active_lcores() {
        let entry = config.entry(lcore_id).unwrap();
        let shared_with = config
            .active_lcores()
            .into_iter()
            .filter(|other| {
                *other != lcore_id && entry.shares_affinity_with(config.entry(*other).unwrap())
            })
            .collect::<Vec<_>>();

        if !shared_with.is_empty() {
            println!("lcore {lcore_id} shares its processors with {shared_with:?}");
        }
    }

    println!("Example completed successfully!");
}
