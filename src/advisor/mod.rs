//! Middleware chain sitting between the agent run loop and the `LLMEngine`.
//! Advisors see every request before it goes out and every response before
//! the run loop does; the built-in [`tool_call::ToolCallAdvisor`] is how
//! tag-mode tool calling is layered onto providers with no native support.

pub mod tool_call;

use crate::llm::{AgentResponse, Request};

pub use tool_call::ToolCallAdvisor;

/// A single link in the request/response middleware chain. Default method
/// bodies are pass-throughs so a custom advisor only overrides what it
/// cares about.
pub trait Advisor: Send + Sync {
    fn is_builtin(&self) -> bool {
        false
    }

    fn priority(&self) -> i32 {
        0
    }

    fn before_call(&self, request: Request) -> Request {
        request
    }

    fn after_call(&self, _request: &Request, response: AgentResponse) -> AgentResponse {
        response
    }

    fn before_stream(&self, request: Request) -> Request {
        request
    }
}

/// Orders advisors `(is_builtin desc, priority desc, insertion order)` and
/// folds `before_*`/`after_*` hooks over a request or response in that
/// order (and the mirror order for `after_call`, since the highest-priority
/// advisor should see the response last, just as it saw the request first).
#[derive(Default)]
pub struct AdvisorChain {
    advisors: Vec<std::sync::Arc<dyn Advisor>>,
}

impl AdvisorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, advisor: std::sync::Arc<dyn Advisor>) {
        self.advisors.push(advisor);
    }

    fn sorted(&self) -> Vec<std::sync::Arc<dyn Advisor>> {
        let mut items: Vec<(usize, std::sync::Arc<dyn Advisor>)> =
            self.advisors.iter().cloned().enumerate().collect();
        items.sort_by(|(ia, a), (ib, b)| {
            b.is_builtin()
                .cmp(&a.is_builtin())
                .then(b.priority().cmp(&a.priority()))
                .then(ia.cmp(ib))
        });
        items.into_iter().map(|(_, a)| a).collect()
    }

    pub fn apply_before_call(&self, mut request: Request) -> Request {
        for advisor in self.sorted() {
            request = advisor.before_call(request);
        }
        request
    }

    pub fn apply_before_stream(&self, mut request: Request) -> Request {
        for advisor in self.sorted() {
            request = advisor.before_stream(request);
        }
        request
    }

    pub fn apply_after_call(&self, request: &Request, mut response: AgentResponse) -> AgentResponse {
        for advisor in self.sorted().into_iter().rev() {
            response = advisor.after_call(request, response);
        }
        response
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Capability, GenerateConfig};
    use std::sync::Arc;
    use std::sync::Mutex;

    struct RecordingAdvisor {
        name: &'static str,
        builtin: bool,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Advisor for RecordingAdvisor {
        fn is_builtin(&self) -> bool {
            self.builtin
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn before_call(&self, request: Request) -> Request {
            self.log.lock().unwrap().push(self.name);
            request
        }
        fn after_call(&self, _request: &Request, response: AgentResponse) -> AgentResponse {
            self.log.lock().unwrap().push(self.name);
            response
        }
    }

    fn dummy_request() -> Request {
        Request {
            model: "test".to_string(),
            messages: vec![crate::llm::Message::user("hi")],
            tools: vec![],
            generate_config: GenerateConfig::default(),
            capability: Capability {
                supports_native_tool_calls: true,
            },
        }
    }

    #[test]
    fn before_call_runs_builtin_and_high_priority_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = AdvisorChain::new();
        chain.add(Arc::new(RecordingAdvisor {
            name: "custom-low",
            builtin: false,
            priority: 1,
            log: log.clone(),
        }));
        chain.add(Arc::new(RecordingAdvisor {
            name: "builtin",
            builtin: true,
            priority: 10,
            log: log.clone(),
        }));
        chain.add(Arc::new(RecordingAdvisor {
            name: "custom-high",
            builtin: false,
            priority: 5,
            log: log.clone(),
        }));

        chain.apply_before_call(dummy_request());
        assert_eq!(*log.lock().unwrap(), vec!["builtin", "custom-high", "custom-low"]);
    }

    #[test]
    fn after_call_runs_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = AdvisorChain::new();
        chain.add(Arc::new(RecordingAdvisor {
            name: "builtin",
            builtin: true,
            priority: 10,
            log: log.clone(),
        }));
        chain.add(Arc::new(RecordingAdvisor {
            name: "custom",
            builtin: false,
            priority: 1,
            log: log.clone(),
        }));

        let req = dummy_request();
        let resp = AgentResponse {
            content: String::new(),
            finish_reason: crate::llm::FinishReason::Stop,
            tool_calls: vec![],
            usage: Default::default(),
        };
        chain.apply_after_call(&req, resp);
        assert_eq!(*log.lock().unwrap(), vec!["custom", "builtin"]);
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = AdvisorChain::new();
        chain.add(Arc::new(RecordingAdvisor {
            name: "first",
            builtin: false,
            priority: 0,
            log: log.clone(),
        }));
        chain.add(Arc::new(RecordingAdvisor {
            name: "second",
            builtin: false,
            priority: 0,
            log: log.clone(),
        }));
        chain.apply_before_call(dummy_request());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }
}
