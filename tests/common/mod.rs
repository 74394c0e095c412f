//! Shared test utilities: scripted user, fake devices, scripted pipeline

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;

use pushtalk::voice::{
    AudioChunk, AudioFormat, Console, FrameTap, InputDevice, InputStream, KeyCommand,
    OutputDevice, PcmOutput, Prompt,
};
use pushtalk::{
    ConversationRequest, Error, EventStream, LifecycleNotice, LifecycleSink, PipelineEvent,
    Result, VoicePipeline,
};

pub type Shared<T> = Arc<Mutex<T>>;

fn shared<T: Default>() -> Shared<T> {
    Arc::new(Mutex::new(T::default()))
}

/// Samples per 100 ms at 24 kHz
pub const BATCH_100MS: usize = 2_400;

/// A batch of `len` samples all equal to `value`
pub fn batch(value: f32, len: usize) -> Vec<f32> {
    vec![value; len]
}

/// One thing the scripted user or device does
#[derive(Debug, Clone)]
pub enum Step {
    /// Device callback delivers a batch
    Frames(Vec<f32>),
    /// Device callback reports a status condition
    Status(&'static str),
    /// User presses a key
    Key(KeyCommand),
    /// Poll times out with no key
    Wait,
    /// Poll blocks this long, then times out with no key
    Pause(Duration),
}

pub use Step::{Frames, Key, Pause, Status, Wait};

pub const TOGGLE: Step = Key(KeyCommand::Toggle);
pub const TERMINATE: Step = Key(KeyCommand::Terminate);

/// Open/close bookkeeping for a fake device
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub opened: usize,
    pub closed: usize,
}

/// Console state observed by tests
#[derive(Debug, Default)]
pub struct ConsoleLog {
    pub prompts: Vec<Prompt>,
    pub entered: usize,
    pub left: usize,
}

/// Shared handles between the fakes and the test body
#[derive(Clone)]
pub struct Rig {
    pub tap: Shared<Option<FrameTap>>,
    pub input: Shared<DeviceLog>,
    pub console: Shared<ConsoleLog>,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            tap: shared(),
            input: shared(),
            console: shared(),
        }
    }

    pub fn input_device(&self) -> FakeInput {
        FakeInput {
            tap: Arc::clone(&self.tap),
            log: Arc::clone(&self.input),
            fail: false,
        }
    }

    pub fn failing_input_device(&self) -> FakeInput {
        FakeInput {
            fail: true,
            ..self.input_device()
        }
    }

    pub fn console(&self, steps: Vec<Step>) -> ScriptedConsole {
        ScriptedConsole {
            steps: steps.into(),
            tap: Arc::clone(&self.tap),
            log: Arc::clone(&self.console),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.console.lock().unwrap().prompts.clone()
    }

    pub fn input_opened(&self) -> usize {
        self.input.lock().unwrap().opened
    }

    pub fn input_closed(&self) -> usize {
        self.input.lock().unwrap().closed
    }

    /// Feed `value` batches from another thread, like a device callback,
    /// until the capture stream is closed
    pub fn spawn_device(&self, value: f32) -> std::thread::JoinHandle<usize> {
        let tap = Arc::clone(&self.tap);
        std::thread::spawn(move || {
            let mut attached = false;
            let mut batches = 0;
            loop {
                {
                    let guard = tap.lock().unwrap();
                    match guard.as_ref() {
                        Some(tap) => {
                            attached = true;
                            tap.deliver(&[value; 240]);
                            batches += 1;
                        }
                        None if attached => return batches,
                        None => {}
                    }
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    }

    /// Whether a device callback could still deliver frames
    pub fn tap_attached(&self) -> bool {
        self.tap.lock().unwrap().is_some()
    }
}

/// Input device whose callback is driven by the scripted console
pub struct FakeInput {
    tap: Shared<Option<FrameTap>>,
    log: Shared<DeviceLog>,
    fail: bool,
}

impl InputDevice for FakeInput {
    fn open(&self, _format: AudioFormat, tap: FrameTap) -> Result<Box<dyn InputStream>> {
        if self.fail {
            return Err(Error::DeviceOpen("no input device available".to_string()));
        }
        *self.tap.lock().unwrap() = Some(tap);
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(FakeInputStream {
            tap: Arc::clone(&self.tap),
            log: Arc::clone(&self.log),
            open: true,
        }))
    }
}

struct FakeInputStream {
    tap: Shared<Option<FrameTap>>,
    log: Shared<DeviceLog>,
    open: bool,
}

impl InputStream for FakeInputStream {
    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.tap.lock().unwrap().take();
            self.log.lock().unwrap().closed += 1;
        }
    }
}

impl Drop for FakeInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Console replaying a script of device deliveries and key presses
pub struct ScriptedConsole {
    steps: VecDeque<Step>,
    tap: Shared<Option<FrameTap>>,
    log: Shared<ConsoleLog>,
}

impl Console for ScriptedConsole {
    fn enter(&mut self) -> Result<()> {
        self.log.lock().unwrap().entered += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.log.lock().unwrap().left += 1;
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<KeyCommand>> {
        loop {
            match self.steps.pop_front() {
                None => return Err(Error::Input("script exhausted".to_string())),
                Some(Step::Frames(samples)) => {
                    if let Some(tap) = self.tap.lock().unwrap().as_ref() {
                        tap.deliver(&samples);
                    }
                }
                Some(Step::Status(status)) => {
                    if let Some(tap) = self.tap.lock().unwrap().as_ref() {
                        tap.report(status);
                    }
                }
                Some(Step::Key(key)) => return Ok(Some(key)),
                Some(Step::Wait) => return Ok(None),
                Some(Step::Pause(duration)) => {
                    std::thread::sleep(duration);
                    return Ok(None);
                }
            }
        }
    }

    fn show(&mut self, prompt: &Prompt) {
        self.log.lock().unwrap().prompts.push(prompt.clone());
    }
}

/// What reached the speaker or the lifecycle sink, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trace {
    Played(Vec<i16>),
    Notice(LifecycleNotice),
}

/// Playback bookkeeping for a fake speaker
#[derive(Debug, Default)]
pub struct OutputLog {
    pub opened: usize,
    pub closed: usize,
    pub writes: Vec<Vec<i16>>,
}

impl OutputLog {
    /// Everything the device rendered, concatenated
    pub fn rendered(&self) -> Vec<i16> {
        self.writes.concat()
    }
}

/// Speaker recording every write
#[derive(Clone)]
pub struct FakeOutput {
    pub log: Shared<OutputLog>,
    pub trace: Shared<Vec<Trace>>,
    fail: bool,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self {
            log: shared(),
            trace: shared(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn rendered(&self) -> Vec<i16> {
        self.log.lock().unwrap().rendered()
    }

    pub fn trace(&self) -> Vec<Trace> {
        self.trace.lock().unwrap().clone()
    }
}

impl OutputDevice for FakeOutput {
    fn open(&self, _format: AudioFormat) -> Result<Box<dyn PcmOutput>> {
        if self.fail {
            return Err(Error::DeviceOpen("no output device available".to_string()));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(FakePcm {
            log: Arc::clone(&self.log),
            trace: Arc::clone(&self.trace),
            open: true,
        }))
    }
}

struct FakePcm {
    log: Shared<OutputLog>,
    trace: Shared<Vec<Trace>>,
    open: bool,
}

impl PcmOutput for FakePcm {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if !self.open {
            return Err(Error::Audio("closed".to_string()));
        }
        self.log.lock().unwrap().writes.push(samples.to_vec());
        self.trace
            .lock()
            .unwrap()
            .push(Trace::Played(samples.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.log.lock().unwrap().closed += 1;
        }
        Ok(())
    }
}

/// Lifecycle sink writing into the same trace as the fake speaker
pub struct TraceSink {
    pub trace: Shared<Vec<Trace>>,
    pub failures: Shared<Vec<String>>,
}

impl TraceSink {
    pub fn new(trace: &Shared<Vec<Trace>>) -> Self {
        Self {
            trace: Arc::clone(trace),
            failures: shared(),
        }
    }
}

impl LifecycleSink for TraceSink {
    fn notice(&mut self, notice: LifecycleNotice) {
        self.trace.lock().unwrap().push(Trace::Notice(notice));
    }

    fn failure(&mut self, error: &Error) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

/// Response the scripted pipeline gives to one request
pub enum Response {
    Events(Vec<Result<PipelineEvent>>),
    Fail(&'static str),
}

/// Pipeline replaying canned responses and recording requests
pub struct ScriptedPipeline {
    responses: Mutex<VecDeque<Response>>,
    pub requests: Shared<Vec<ConversationRequest>>,
}

impl ScriptedPipeline {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: shared(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl VoicePipeline for ScriptedPipeline {
    async fn run(&self, request: ConversationRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Response::Events(events)) => Ok(stream::iter(events).boxed()),
            Some(Response::Fail(message)) => Err(Error::Pipeline(message.to_string())),
            None => Ok(stream::empty().boxed()),
        }
    }
}

pub fn audio(samples: &[i16]) -> Result<PipelineEvent> {
    Ok(PipelineEvent::Audio(AudioChunk::new(samples.to_vec())))
}

pub fn notice(notice: LifecycleNotice) -> Result<PipelineEvent> {
    Ok(PipelineEvent::Lifecycle(notice))
}
