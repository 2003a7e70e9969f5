//! The app's command surface, assembled into the frozen binding tree at
//! startup.

pub mod dylan;

use std::sync::Arc;

use crate::apps::{Field, Form, LOCATION_COMMAND};
use crate::bindings::{BindingError, BindingNode, BindingTree, BindingTreeBuilder};
use crate::config::AppConfig;
use crate::pipeline::{DeployPipeline, PipelineSettings};
use crate::ports::{CiService, CodeHost, HostApi};

pub use dylan::DylanCommand;

pub const DYLAN_PATH: &str = "/commands/dylan";

/// External services the commands talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub code_host: Arc<dyn CodeHost>,
    pub ci: Arc<dyn CiService>,
    pub host: Arc<dyn HostApi>,
}

/// Register every command and freeze the tree.
pub fn build_binding_tree(
    config: &AppConfig,
    deps: Collaborators,
) -> Result<BindingTree, BindingError> {
    let settings = PipelineSettings {
        check_name: config.check_name.clone(),
        job_name: config.ci_job_name.clone(),
        artifact_suffix: config.artifact_suffix.clone(),
    };
    let pipeline = DeployPipeline::new(deps.code_host.clone(), deps.ci, deps.host, settings);
    let dylan = DylanCommand::new(
        deps.code_host,
        config.github_org.clone(),
        config.repo_prefix.clone(),
        pipeline,
    );

    let mut builder = BindingTreeBuilder::new();
    let commands = builder.add_root(BindingNode::group(LOCATION_COMMAND))?;
    builder.add_child(
        commands,
        BindingNode::command("dylan", DYLAN_PATH, Arc::new(dylan))
            .label("dylan")
            .description("Build a plugin from a PR")
            .form(Form::new(vec![
                Field::text("pr")
                    .label("pr")
                    .description("Full URL to a plugin repo's PR"),
            ])),
    )?;
    Ok(builder.build())
}
