//! Driver binary for the cabletree simulation engine
//!
//! Builds one of the benchmark networks (ring, all-to-all or random) from
//! the resolved options, runs the epoch loop to `tfinal` and optionally
//! exports spikes to per-rank files and sampled voltage traces to JSON.

use clap::Parser;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cabletree_cli::config::{Cli, Options};
use cabletree_cli::error::{CliError, CliResult};
use cabletree_cli::exporter::SpikeFileExporter;
use cabletree_cli::trace::SampleTrace;
use cabletree_core::{
    BasicRecipeParam, CellMember, CommunicationPolicy, CompleteGraphRecipe, DomainDecomposition,
    Model, MulticoreBackend, ProbeDistribution, RandomGraphRecipe, Recipe, RingRecipe,
    SerialPolicy,
};

// sampling cadence of attached voltage probes (ms)
const SAMPLE_DT: f64 = 0.1;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match run(&cli) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            error!("{}", msg);
            std::process::exit(1);
        }
        Err(err) => {
            error!("{}", err);
            std::process::exit(2);
        }
    }
}

fn banner<P: CommunicationPolicy>(policy: &P) {
    println!("====================");
    println!("  starting cabletree");
    println!(
        "  - communication policy: serial ({} rank)",
        policy.size()
    );
    println!("====================");
}

fn make_recipe(options: &Options) -> Box<dyn Recipe> {
    let pdist = ProbeDistribution {
        proportion: options.probe_ratio,
        all_segments: !options.probe_soma_only,
    };
    let param = BasicRecipeParam {
        num_compartments: options.compartments_per_segment,
        num_synapses: if options.all_to_all {
            options.cells.saturating_sub(1) as usize
        } else {
            options.synapses_per_cell
        },
        synapse_type: options.syn_type.clone(),
        ..Default::default()
    };

    if options.all_to_all {
        Box::new(CompleteGraphRecipe::new(options.cells, param, pdist))
    } else if options.ring {
        Box::new(RingRecipe::new(options.cells, param, pdist))
    } else {
        Box::new(RandomGraphRecipe::new(options.cells, param, pdist))
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let options = cli.resolve_options()?;
    if let Some(path) = &cli.ofile {
        options.save(path)?;
    }

    let policy = SerialPolicy;
    let rank = policy.id();

    banner(&policy);
    print!("{}", options);
    println!();
    println!(
        ":: simulation to {} ms in {} steps of {} ms",
        options.tfinal,
        (options.tfinal / options.dt).ceil(),
        options.dt
    );

    let decomposition = DomainDecomposition::new(
        options.cells,
        policy.size(),
        rank,
        options.group_size,
    )?;
    let recipe = make_recipe(&options);
    let mut model: Model<MulticoreBackend, SerialPolicy> =
        Model::new(recipe.as_ref(), decomposition.clone(), policy)?;

    // spike-file output: either per rank, or the gathered stream on rank 0
    let mut exporter_handle: Option<Arc<Mutex<SpikeFileExporter>>> = None;
    if options.spike_file_output {
        let writes_local = options.single_file_per_rank;
        if writes_local || rank == 0 {
            let exporter = SpikeFileExporter::new(
                &options.file_name,
                &options.output_path,
                &options.file_extension,
                options.over_write,
                rank,
            )?;
            let handle = Arc::new(Mutex::new(exporter));
            exporter_handle = Some(Arc::clone(&handle));
            let callback = Box::new(move |spikes: &[cabletree_core::Spike]| {
                if let Err(err) = handle.lock().unwrap().output(spikes) {
                    error!("spike export failed: {}", err);
                }
            });
            if writes_local {
                model.set_local_spike_callback(callback);
            } else {
                model.set_global_spike_callback(callback);
            }
        }
    }

    // seed activity with one artificial spike per 20 cells
    let (first, last) = decomposition.local_range();
    let mut source = 20 * ((first + 19) / 20);
    let mut num_seeds = 0;
    while source < last {
        model.add_artificial_spike(CellMember::new(source, 0));
        num_seeds += 1;
        source += 20;
    }
    debug!(num_seeds, "artificial spikes added");

    // attach samplers to all probes within the trace gid bound
    let mut sampled = Vec::new();
    for probe in model.probes() {
        if options
            .trace_max_gid
            .is_some_and(|max| probe.member.gid > max)
        {
            continue;
        }
        model.attach_sampler(probe.member, SAMPLE_DT)?;
        sampled.push(probe.member);
    }

    model.run(options.tfinal, options.dt)?;

    println!("there were {} spikes", model.num_spikes());

    for probe in sampled {
        if let Some(samples) = model.samples(probe) {
            let mut trace = SampleTrace::for_probe(probe);
            trace.samples = samples.to_vec();
            let path = trace.write_json(&options.trace_prefix)?;
            debug!(path = %path.display(), "trace written");
        }
    }

    if let Some(handle) = exporter_handle {
        handle.lock().unwrap().flush()?;
    }
    Ok(())
}
