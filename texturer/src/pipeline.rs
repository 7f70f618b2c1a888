use std::path::{Path, PathBuf};

use log::info;
use structopt::StructOpt;

use base::defs::{Error, ErrorKind::*, Result};

use crate::atlas::{generate_texture_atlases, TextureAtlas};
use crate::cost::{calculate_data_costs, DataCosts};
use crate::graph::{build_adjacency_graph, Graph};
use crate::labeling::{
    apply_labeling, load_labeling, save_labeling, view_selection,
};
use crate::mesh::{load_mesh, Mesh};
use crate::model::{build_model, Model};
use crate::patch::{compute_validity_masks, generate_texture_patches};
use crate::scene::{generate_debug_embeddings, load_scene, TextureView};
use crate::seam::{global_seam_leveling, local_seam_leveling};
use crate::timer::Timer;

#[derive(Clone)]
pub struct Settings {
    pub global_seam_leveling: bool,
    pub local_seam_leveling: bool,
    pub data_cost_file: Option<PathBuf>,
    pub labeling_file: Option<PathBuf>,
    pub write_intermediate_results: bool,
    pub write_timings: bool,
    pub write_view_selection_model: bool,
    /// Prefix for intermediate artifacts; absent in embedded runs,
    /// which write nothing.
    pub out_prefix: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_seam_leveling: false,
            local_seam_leveling: true,
            data_cost_file: None,
            labeling_file: None,
            write_intermediate_results: false,
            write_timings: false,
            write_view_selection_model: false,
            out_prefix: None,
        }
    }
}

/// Receives the consolidated output of a pipeline run.
pub trait ModelSink {
    fn deliver(&mut self, model: Model) -> Result<()>;
    fn deliver_view_selection(&mut self, model: Model) -> Result<()>;
}

/// Serializes delivered models under a path prefix.
pub struct FileSink {
    pub prefix: PathBuf,
}

impl ModelSink for FileSink {
    fn deliver(&mut self, model: Model) -> Result<()> {
        info!("saving model '{}'", self.prefix.display());
        model.save(&self.prefix)
    }

    fn deliver_view_selection(&mut self, model: Model) -> Result<()> {
        let prefix =
            PathBuf::from(format!("{}_view_selection", self.prefix.display()));
        info!("saving model '{}'", prefix.display());
        model.save(&prefix)
    }
}

/// Keeps delivered models in memory for an embedding caller.
#[derive(Default)]
pub struct MemorySink {
    pub buffers: Option<crate::model::ModelBuffers>,
    pub view_selection_buffers: Option<crate::model::ModelBuffers>,
}

impl ModelSink for MemorySink {
    fn deliver(&mut self, model: Model) -> Result<()> {
        self.buffers = Some(model.to_buffers());
        Ok(())
    }

    fn deliver_view_selection(&mut self, model: Model) -> Result<()> {
        self.view_selection_buffers = Some(model.to_buffers());
        Ok(())
    }
}

/// Runs the staged texturing pipeline exactly once.
///
/// Labeling is resolved either by view selection over computed or
/// loaded data costs, or by a precomputed labeling file which skips
/// optimization entirely. Either way the run proceeds through patch
/// generation, seam handling, atlas generation, consolidation and
/// delivery to the sink.
pub fn texture_mesh(
    mesh: &Mesh,
    views: &mut [TextureView],
    settings: &Settings,
    sink: &mut dyn ModelSink,
) -> Result<()> {
    let mut timer = Timer::new();

    info!("building adjacency graph");
    let mut graph = build_adjacency_graph(mesh);
    timer.measure("Building adjacency graph");

    if let Some(labeling_file) = &settings.labeling_file {
        info!("loading labeling from '{}'", labeling_file.display());
        let labeling = load_labeling(labeling_file)?;
        apply_labeling(&labeling, views.len(), &mut graph)?;
        timer.measure("Loading labeling");
    } else {
        info!("view selection");
        let data_costs = resolve_data_costs(mesh, views, settings, &graph)?;
        timer.measure("Calculating data costs");

        view_selection(&data_costs, &mut graph);
        timer.measure("Running view selection");

        if settings.write_intermediate_results {
            if let Some(prefix) = &settings.out_prefix {
                let path = suffixed(prefix, "_labeling.json.gz");
                info!("writing labeling file '{}'", path.display());
                save_labeling(&path, &graph)?;
            }
        }
    }

    info!("generating texture patches");
    let mut patches = generate_texture_patches(&graph, mesh, views)?;
    timer.measure("Generating texture patches");

    if settings.global_seam_leveling {
        info!("running global seam leveling");
        global_seam_leveling(mesh, &mut patches);
        timer.measure("Running global seam leveling");
    } else {
        compute_validity_masks(&mut patches);
        timer.measure("Calculating texture patch validity masks");
    }

    if settings.local_seam_leveling {
        info!("running local seam leveling");
        local_seam_leveling(&mut patches);
    }
    timer.measure("Running local seam leveling");

    info!("generating texture atlases");
    let atlases = generate_texture_atlases(&patches)?;
    timer.measure("Generating texture atlases");

    info!("building model");
    let model = build_model(mesh, &atlases);
    timer.measure("Building model");

    sink.deliver(model)?;
    timer.measure("Saving");

    info!(
        "whole texturing procedure took {:.1}s",
        timer.total_elapsed()
    );
    if settings.write_timings {
        if let Some(prefix) = &settings.out_prefix {
            let path = suffixed(prefix, "_timings.csv");
            info!("writing timing report '{}'", path.display());
            timer.write_report(&path)?;
        }
    }

    if settings.write_view_selection_model {
        info!("generating debug texture patches");
        generate_debug_embeddings(views);
        let debug_atlases = rebuild_atlases(&graph, mesh, views)?;

        info!("building debug model");
        let debug_model = build_model(mesh, &debug_atlases);
        sink.deliver_view_selection(debug_model)?;
    }

    Ok(())
}

fn resolve_data_costs(
    mesh: &Mesh,
    views: &[TextureView],
    settings: &Settings,
    graph: &Graph,
) -> Result<DataCosts> {
    if let Some(cost_file) = &settings.data_cost_file {
        info!("loading data cost file '{}'", cost_file.display());
        return DataCosts::load_from_file(
            cost_file,
            graph.num_nodes(),
            views.len(),
        );
    }

    let data_costs = calculate_data_costs(mesh, views);
    if settings.write_intermediate_results {
        if let Some(prefix) = &settings.out_prefix {
            let path = suffixed(prefix, "_data_costs.json.gz");
            info!("writing data cost file '{}'", path.display());
            data_costs.save_to_file(&path)?;
        }
    }
    Ok(data_costs)
}

/// Regenerates patches and atlases from the current labeling, used
/// for the view-selection debug model after the embedding swap.
fn rebuild_atlases(
    graph: &Graph,
    mesh: &Mesh,
    views: &[TextureView],
) -> Result<Vec<TextureAtlas>> {
    let patches = generate_texture_patches(graph, mesh, views)?;
    generate_texture_atlases(&patches)
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

#[derive(StructOpt)]
#[structopt(about = "Texture a mesh from a set of calibrated views")]
pub struct TextureParams {
    #[structopt(help = "Input .obj mesh file")]
    pub in_mesh: PathBuf,

    #[structopt(help = "Input scene description .json file")]
    pub in_scene: PathBuf,

    #[structopt(help = "Output path prefix")]
    pub out_prefix: PathBuf,

    #[structopt(help = "Level seams globally across the whole mesh", long)]
    pub global_seam_leveling: bool,

    #[structopt(help = "Skip per-patch local seam leveling", long)]
    pub skip_local_seam_leveling: bool,

    #[structopt(help = "Precomputed data cost file", long)]
    pub data_cost_file: Option<PathBuf>,

    #[structopt(help = "Precomputed labeling file", long)]
    pub labeling_file: Option<PathBuf>,

    #[structopt(help = "Write intermediate results", long)]
    pub write_intermediate_results: bool,

    #[structopt(help = "Write a per-stage timing report", long)]
    pub write_timings: bool,

    #[structopt(
        help = "Also write a model textured by flat per-view colors",
        long
    )]
    pub write_view_selection_model: bool,
}

pub fn texture_with_params(params: &TextureParams) -> Result<()> {
    let out_dir = match params.out_prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => ".".as_ref(),
    };
    if !out_dir.is_dir() {
        let desc = format!(
            "destination directory '{}' does not exist",
            out_dir.display()
        );
        return Err(Error::new(InconsistentState, desc));
    }

    info!("loading mesh '{}'", params.in_mesh.display());
    let mesh = load_mesh(&params.in_mesh)?;

    info!("loading scene '{}'", params.in_scene.display());
    let mut views = load_scene(&params.in_scene)?;

    let settings = Settings {
        global_seam_leveling: params.global_seam_leveling,
        local_seam_leveling: !params.skip_local_seam_leveling,
        data_cost_file: params.data_cost_file.clone(),
        labeling_file: params.labeling_file.clone(),
        write_intermediate_results: params.write_intermediate_results,
        write_timings: params.write_timings,
        write_view_selection_model: params.write_view_selection_model,
        out_prefix: Some(params.out_prefix.clone()),
    };

    let mut sink = FileSink {
        prefix: params.out_prefix.clone(),
    };
    texture_mesh(&mesh, &mut views, &settings, &mut sink)
}
