pub mod activity;
pub mod clock;
pub mod config;
pub mod dedupe;
pub mod dom;
pub mod error;
pub mod event;
pub mod extract;
pub mod inspect;
pub mod normalize;
pub mod notifications;
pub mod recorder;
pub mod resolve;
pub mod selector;
pub mod service;
pub mod snapshot;
pub mod transport;
pub mod watcher;
pub mod widgets;

// Re-export commonly used items
pub use activity::{ActivityMonitor, ActivityState, PageMilestone, RequestKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RecorderConfig;
pub use dedupe::DedupeWindow;
pub use dom::{Document, MutationRecord, NodeId, ObserveOptions, ObserverId};
pub use error::{RecorderError, Result};
pub use event::{Action, Envelope, InteractionEvent, MutationAction, MutationEvent};
pub use inspect::ElementInfo;
pub use normalize::EventNormalizer;
pub use notifications::{Notification, NotificationScraper, Severity};
pub use recorder::{ActivitySignal, NativeEvent, Recorder};
pub use resolve::InteractiveResolver;
pub use selector::{
    find_element, SelectorList, SelectorOptions, SelectorSynthesizer, SynthesizedSelector,
};
pub use snapshot::{LoadedPage, NodeTarget, PageSnapshot, TreeNode};
pub use transport::{Backoff, MemoryTransport, RetryingTransport, Transport};
pub use watcher::{MutationBatch, MutationWatcher};
pub use widgets::{WidgetCatalog, WidgetStrategy};
