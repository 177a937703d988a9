//! Run orchestration.
//!
//! One driver owns one run slot. A run resolves the class, validates the
//! entry point's shape, then invokes it on a blocking worker while the
//! async side delivers output to the observer. Every failure path writes a
//! line to the run's error stream and ends with the output pipe closed;
//! nothing propagates out of the driver except a structured [`ExecError`].

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::context::{
  DEFAULT_CHANNEL_CAPACITY, EmptyInput, ExecutionContext, InputSource, OutputPipe, StreamKind,
};
use super::runtime::{InvokeError, InvokeRequest, MethodRuntime};
use super::types::{ExecError, MAIN_NOT_ACCESSIBLE_MESSAGE, NO_MAIN_MESSAGE, RunState};
use crate::cancel::CancelSignal;
use crate::classpath::ClasspathAggregator;
use crate::dex::MAIN_DESCRIPTOR;

/// Observer receiving each delivered output batch, on one ordered context.
pub type OutputObserver = Arc<dyn Fn(StreamKind, String) + Send + Sync>;

/// Factory producing the input source for each run.
pub type InputFactory = Box<dyn Fn() -> Box<dyn InputSource> + Send + Sync>;

/// Resolves and invokes entry points from an aggregate classpath.
pub struct ExecutionDriver<R: MethodRuntime> {
  aggregator: Arc<ClasspathAggregator>,
  runtime: Arc<R>,
  observer: OutputObserver,
  input_factory: InputFactory,
  state: Mutex<RunState>,
}

impl<R: MethodRuntime> ExecutionDriver<R> {
  pub fn new(aggregator: Arc<ClasspathAggregator>, runtime: R, observer: OutputObserver) -> Self {
    Self {
      aggregator,
      runtime: Arc::new(runtime),
      observer,
      input_factory: Box::new(|| Box::new(EmptyInput)),
      state: Mutex::new(RunState::Idle),
    }
  }

  /// Replace the per-run input source (editor-backed in the IDE).
  pub fn with_input_factory(mut self, factory: InputFactory) -> Self {
    self.input_factory = factory;
    self
  }

  pub fn state(&self) -> RunState {
    *self.state.lock().unwrap()
  }

  /// True while a run is in flight. Gates the caller's rerun control.
  pub fn is_active(&self) -> bool {
    self.state() == RunState::Running
  }

  /// Return to `Idle` after a completed or failed run. Returns false while
  /// a run is still active.
  pub fn reload(&self) -> bool {
    let mut state = self.state.lock().unwrap();
    if *state == RunState::Running {
      return false;
    }
    *state = RunState::Idle;
    true
  }

  /// Execute `class_name`'s entry point.
  ///
  /// Output and error text reach the observer in write order; the pipe is
  /// closed on every exit path. Only one run may be active at a time.
  pub async fn run(&self, class_name: &str, cancel: &CancelSignal) -> Result<(), ExecError> {
    {
      let mut state = self.state.lock().unwrap();
      if *state == RunState::Running {
        return Err(ExecError::AlreadyRunning);
      }
      *state = RunState::Running;
    }
    info!(class = %class_name, "run started");

    let (pipe, receiver) = OutputPipe::bounded(DEFAULT_CHANNEL_CAPACITY);
    let observer = self.observer.clone();
    let delivery = tokio::spawn(receiver.forward_to(move |stream, text| observer(stream, text)));

    let result = self.run_inner(class_name, cancel, &pipe).await;

    // Close the pipe, then wait for the delivery context to drain so the
    // observer has seen everything before the state flips.
    drop(pipe);
    if let Err(e) = delivery.await {
      warn!(error = %e, "output delivery task failed");
    }

    let final_state = if result.is_ok() {
      RunState::Completed
    } else {
      RunState::Failed
    };
    *self.state.lock().unwrap() = final_state;
    info!(class = %class_name, state = ?final_state, "run finished");
    result
  }

  async fn run_inner(&self, class_name: &str, cancel: &CancelSignal, pipe: &OutputPipe) -> Result<(), ExecError> {
    // Resolve through the aggregate classpath.
    let class = match self.aggregator.load_class(class_name) {
      Ok(class) => class,
      Err(e) => {
        pipe.line(StreamKind::Err, &e.to_string()).await;
        return Err(ExecError::Resolution(e));
      }
    };

    // Entry point must exist...
    let main = match class.find_method("main", MAIN_DESCRIPTOR) {
      Some(method) => method.clone(),
      None => {
        pipe.line(StreamKind::Err, NO_MAIN_MESSAGE).await;
        return Err(ExecError::NoMainMethod {
          class: class_name.to_string(),
        });
      }
    };

    // ...and be invocable: public and static, or public on a class with a
    // public no-argument constructor.
    let invocable = main.is_public() && (main.is_static() || class.has_public_noarg_constructor());
    if !invocable {
      pipe.line(StreamKind::Err, MAIN_NOT_ACCESSIBLE_MESSAGE).await;
      return Err(ExecError::MainNotAccessible {
        class: class_name.to_string(),
      });
    }

    if cancel.is_cancelled() {
      pipe.line(StreamKind::Err, "Run cancelled").await;
      return Err(ExecError::Cancelled);
    }

    let request = InvokeRequest {
      class_name: class_name.to_string(),
      method: main,
      args: Vec::new(),
      classpath: self.aggregator.unit_paths(),
    };
    let mut ctx = ExecutionContext {
      out: pipe.writer(StreamKind::Out),
      err: pipe.writer(StreamKind::Err),
      input: (self.input_factory)(),
    };
    let runtime = self.runtime.clone();

    debug!(class = %request.class_name, "invoking entry point");
    let joined = tokio::task::spawn_blocking(move || {
      let result = runtime.invoke(&request, &mut ctx);
      // The context must die on the worker thread: its writers flush with
      // blocking sends.
      if let Err(ref e) = result
        && let InvokeError::UserCode { message } = e
      {
        ctx.err.write_line(&format!("Uncaught exception: {}", message));
      }
      ctx.flush();
      drop(ctx);
      result
    })
    .await;

    match joined {
      Ok(Ok(())) => Ok(()),
      Ok(Err(InvokeError::UserCode { message })) => Err(ExecError::Invocation { message }),
      Ok(Err(InvokeError::Runtime { message })) => {
        pipe.line(StreamKind::Err, &format!("Runtime failure: {}", message)).await;
        Err(ExecError::Invocation { message })
      }
      Err(join_error) => {
        // A panicking runtime must not take the host down with it.
        let message = format!("runtime panicked: {}", join_error);
        pipe.line(StreamKind::Err, &message).await;
        Err(ExecError::Invocation { message })
      }
    }
  }
}
