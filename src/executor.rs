//! Sequential task execution.
//!
//! Running a task first resolves its prerequisites depth-first, in the order
//! they were declared, and then runs every task of the resulting plan one
//! after another on the current runtime. Nothing is run concurrently within a
//! single invocation; each action has to finish before the next one starts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::Env;
use crate::blueprint::{Pipeline, TaskContext, TaskId};
use crate::error::PipelineError;
use crate::utils::{STYLE_PIPELINE, STYLE_TASK, as_overhead};

impl Pipeline {
    /// Order in which the tasks would be executed when running `id`. A task
    /// reachable through several prerequisites appears once, at its first
    /// position.
    pub fn plan(&self, id: TaskId) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        self.visit(id, &mut seen, &mut order);
        order
    }

    fn visit(&self, id: TaskId, seen: &mut HashSet<TaskId>, order: &mut Vec<TaskId>) {
        if !seen.insert(id) {
            return;
        }

        for &dependency in self.dependencies(id) {
            self.visit(dependency, seen, order);
        }

        order.push(id);
    }

    /// Run a task together with all of its prerequisites.
    ///
    /// The first failing action stops the run: tasks later in the plan are not
    /// started, and the error is returned tagged with the failing task's name.
    pub async fn run(self: &Arc<Self>, id: TaskId, env: &Env) -> Result<(), PipelineError> {
        let plan = self.plan(id);

        let root = tracing::info_span!("run", task = %self.name(id));
        root.pb_set_style(&STYLE_PIPELINE);
        root.pb_set_length(plan.len() as u64);
        root.pb_set_message(self.name(id));

        async {
            for index in plan {
                let task = &self.graph[index.0];
                let name = task.name.as_ref();

                let span = tracing::info_span!("task", name);
                span.pb_set_style(&STYLE_TASK);
                span.pb_set_message(&format!("Running {name}"));

                let context = TaskContext {
                    env: env.clone(),
                    pipeline: self.clone(),
                };

                tracing::info!("starting '{name}'...");
                let start = Instant::now();

                (task.action)(context)
                    .instrument(span)
                    .await
                    .map_err(|err| PipelineError::Task(name.to_string(), err))?;

                tracing::info!("finished '{name}' {}", as_overhead(start));
                tracing::Span::current().pb_inc(1);
            }

            Ok(())
        }
        .instrument(root)
        .await
    }

    /// Same as [`Pipeline::run`], looking the task up by name first.
    pub async fn run_named(self: &Arc<Self>, name: &str, env: &Env) -> Result<(), PipelineError> {
        let id = self.lookup(name)?;
        self.run(id, env).await
    }
}
