//! Task graph definition.
//!
//! A [`Blueprint`] collects tasks. Each registered task gets a [`TaskId`]
//! handle, and prerequisites are declared with those handles rather than by
//! name, so a task can only ever depend on something that already exists.
//! Once every task is in, [`Blueprint::finish`] validates the graph and turns
//! it into an immutable [`Pipeline`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::Env;
use crate::error::PipelineError;

/// Boxed future returned by task actions.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type Action = Arc<dyn Fn(TaskContext) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Handle to a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) NodeIndex);

/// Everything an action gets to work with.
#[derive(Clone)]
pub struct TaskContext {
    /// Shared process state.
    pub env: Env,
    /// The pipeline running this task, used by tasks which trigger other tasks.
    pub pipeline: Arc<Pipeline>,
}

pub(crate) struct Task {
    pub name: Cow<'static, str>,
    pub dependencies: Vec<TaskId>,
    pub action: Action,
}

/// The set of tasks being defined.
///
/// # Example
///
/// ```rust
/// use tsumiki::Blueprint;
///
/// let mut blueprint = Blueprint::new();
/// let a = blueprint.task("a").run(|_| async { anyhow::Ok(()) }).unwrap();
/// let b = blueprint.task("b").depends_on([a]).run(|_| async { anyhow::Ok(()) }).unwrap();
/// let pipeline = blueprint.finish().unwrap();
/// assert_eq!(pipeline.plan(b), vec![a, b]);
/// ```
#[derive(Default)]
pub struct Blueprint {
    graph: Graph<Task, ()>,
    names: HashMap<String, TaskId>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start defining a task.
    pub fn task(&mut self, name: impl Into<Cow<'static, str>>) -> TaskDef<'_> {
        TaskDef {
            blueprint: self,
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Validate the graph and freeze it.
    pub fn finish(self) -> Result<Pipeline, PipelineError> {
        // Handles only point backwards, so this can't fail for graphs built
        // through the public API. Checked anyway before anything runs.
        petgraph::algo::toposort(&self.graph, None)
            .map_err(|cycle| PipelineError::Cycle(self.graph[cycle.node_id()].name.to_string()))?;

        Ok(Pipeline {
            graph: self.graph,
            names: self.names,
        })
    }

    fn add_task(
        &mut self,
        name: Cow<'static, str>,
        dependencies: Vec<TaskId>,
        action: Action,
    ) -> Result<TaskId, PipelineError> {
        if self.names.contains_key(name.as_ref()) {
            return Err(PipelineError::DuplicateTask(name.into_owned()));
        }

        let count = self.graph.node_count();
        if let Some(foreign) = dependencies.iter().find(|dep| dep.0.index() >= count) {
            return Err(PipelineError::ForeignHandle {
                task: name.into_owned(),
                index: foreign.0.index(),
            });
        }

        let index = TaskId(self.graph.add_node(Task {
            name: name.clone(),
            dependencies: dependencies.clone(),
            action,
        }));

        for dependency in dependencies {
            self.graph.add_edge(dependency.0, index.0, ());
        }

        self.names.insert(name.into_owned(), index);
        Ok(index)
    }
}

impl Display for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        render_mermaid(&self.graph, f)
    }
}

pub struct TaskDef<'a> {
    blueprint: &'a mut Blueprint,
    name: Cow<'static, str>,
    dependencies: Vec<TaskId>,
}

impl TaskDef<'_> {
    /// Prerequisites, run in the given order before this task.
    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Register the task with its action.
    pub fn run<F, R>(self, action: F) -> Result<TaskId, PipelineError>
    where
        F: Fn(TaskContext) -> R + Send + Sync + 'static,
        R: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let action: Action = Arc::new(move |ctx| -> BoxFuture<anyhow::Result<()>> {
            Box::pin(action(ctx))
        });

        self.blueprint.add_task(self.name, self.dependencies, action)
    }
}

/// A validated, immutable task graph.
pub struct Pipeline {
    pub(crate) graph: Graph<Task, ()>,
    names: HashMap<String, TaskId>,
}

impl Pipeline {
    /// Find a task by name.
    pub fn lookup(&self, name: &str) -> Result<TaskId, PipelineError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::UnknownTask(name.to_string(), self.names().join(", ")))
    }

    pub fn name(&self, id: TaskId) -> &str {
        &self.graph[id.0].name
    }

    /// Names of all tasks, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.names.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn dependencies(&self, id: TaskId) -> &[TaskId] {
        &self.graph[id.0].dependencies
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        render_mermaid(&self.graph, f)
    }
}

fn render_mermaid(graph: &Graph<Task, ()>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "graph LR")?;

    for index in graph.node_indices() {
        let name = graph[index].name.replace('"', "\\\"");
        writeln!(f, "    {}[\"{}\"]", index.index(), name)?;
    }

    for index in graph.node_indices() {
        for dependency in &graph[index].dependencies {
            writeln!(f, "    {} --> {}", dependency.0.index(), index.index())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(blueprint: &mut Blueprint, name: &'static str, deps: &[TaskId]) -> TaskId {
        blueprint
            .task(name)
            .depends_on(deps.iter().copied())
            .run(|_| async { anyhow::Ok(()) })
            .unwrap()
    }

    #[test]
    fn test_duplicate_name() {
        let mut blueprint = Blueprint::new();
        noop(&mut blueprint, "sass", &[]);

        let err = blueprint.task("sass").run(|_| async { anyhow::Ok(()) }).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateTask(name) if name == "sass"));
    }

    #[test]
    fn test_foreign_handle() {
        let mut other = Blueprint::new();
        noop(&mut other, "a", &[]);
        let b = noop(&mut other, "b", &[]);

        let mut blueprint = Blueprint::new();
        let err = blueprint
            .task("c")
            .depends_on([b])
            .run(|_| async { anyhow::Ok(()) })
            .unwrap_err();

        assert!(matches!(err, PipelineError::ForeignHandle { index: 1, .. }));
    }

    #[test]
    fn test_lookup() {
        let mut blueprint = Blueprint::new();
        let js = noop(&mut blueprint, "js", &[]);
        noop(&mut blueprint, "fonts", &[]);
        let pipeline = blueprint.finish().unwrap();

        assert_eq!(pipeline.lookup("js").unwrap(), js);
        assert_eq!(pipeline.name(js), "js");

        let err = pipeline.lookup("css").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Task 'css' is not registered, available tasks: fonts, js"
        );
    }

    #[test]
    fn test_mermaid() {
        let mut blueprint = Blueprint::new();
        let a = noop(&mut blueprint, "sass", &[]);
        let b = noop(&mut blueprint, "js", &[]);
        noop(&mut blueprint, "build", &[a, b]);

        assert_eq!(
            blueprint.to_string(),
            "graph LR\n    0[\"sass\"]\n    1[\"js\"]\n    2[\"build\"]\n    0 --> 2\n    1 --> 2\n"
        );
    }
}
