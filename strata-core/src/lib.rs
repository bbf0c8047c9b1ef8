// Copyright 2025 the strata authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # strata
//! A hierarchical state-chart engine in the UML tradition: nested
//! super/sub-states, entry/exit actions, event-driven transitions with
//! least-common-ancestor exit/enter sequencing, event deferral and event
//! discarding.
//!
//! States are plain types registered into a [`Runtime`]; each declares its
//! reactions once, during [`Runtime::initialize`], through a [`SetupCtx`].
//! Events are arbitrary `Any + Send` values matched by kind. Two façades wrap
//! the single-threaded core: [`StateMachine`] serializes caller-driven
//! dispatch behind a mutex, and [`AsyncStateMachine`] queues events to a
//! dedicated Tokio worker.

pub mod diagram;
pub mod event;
pub mod machine;
pub mod reaction;
pub mod runtime;
pub mod setup;
pub mod state;

#[cfg(feature = "async-tokio")]
pub mod async_machine;

// Re-export the working surface for consumers of the crate.
pub use diagram::UmlDiagramType;
pub use event::{Event, PostedEvent};
pub use machine::StateMachine;
pub use reaction::{transition_action, EventReaction, Reaction, TransitionAction, UmlNote};
pub use runtime::{DebugLogger, EventCtx, Runtime, StateDescriptor};
pub use setup::SetupCtx;
pub use state::{State, StateHandle, StateHooks, StateId};

#[cfg(feature = "async-tokio")]
pub use async_machine::{AsyncStateMachine, DispatchError, DispatchHandle, EVENT_QUEUE_CAPACITY};
