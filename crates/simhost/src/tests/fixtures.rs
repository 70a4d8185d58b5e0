//! Scripted mock host and synthetic trajectories.
//!
//! The mock listens on a loopback port, speaks the real handshake and field
//! framing on blocking `std::net` sockets (one thread per connection) and
//! keeps a small station tree plus parameter store. It answers only the
//! commands the tests use.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use bytes::BytesMut;
use simhost_math::{Mat, Pose};
use simhost_rpc::wire::decode_buffered;
use simhost_rpc::{Decode, Encode, ItemType, RawItem, SessionConfig};

use crate::client::Client;
use crate::events::{Event, EventPayload, EventType, KeyEvent, Selection3d};
use crate::item::ItemList;
use crate::param::ParamValue;

pub const STATION: u64 = 1;
pub const ROBOT: u64 = 2;
pub const TABLE: u64 = 3;
pub const HOME: u64 = 4;

pub const HOME_JOINTS: [f64; 6] = [0.0, -90.0, 90.0, 0.0, 90.0, 0.0];

#[derive(Debug, Clone)]
pub struct MockItem {
    pub name: String,
    pub item_type: ItemType,
    pub parent: u64,
    pub joints: Vec<f64>,
    pub pose: Pose,
    pub params: HashMap<String, ParamValue>,
    /// Instruction summaries, in program order.
    pub instructions: Vec<String>,
    /// Canned `G_ProgJointList` reply: samples, error code, message.
    pub joint_list: Option<(Mat, i32, String)>,
}

impl MockItem {
    fn new(name: &str, item_type: ItemType, parent: u64) -> Self {
        Self {
            name: name.to_string(),
            item_type,
            parent,
            joints: Vec::new(),
            pose: Pose::eye(),
            params: HashMap::new(),
            instructions: Vec::new(),
            joint_list: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HostState {
    pub items: BTreeMap<u64, MockItem>,
    pub params: HashMap<String, ParamValue>,
    next_handle: u64,
    pub render: Vec<bool>,
    /// Sent to every event subscriber, then the socket is closed.
    pub events: Vec<Event>,
    /// Event ids each filtered subscription asked for.
    pub event_filters: Vec<Vec<i32>>,
    /// Every command line received, in order.
    pub log: Vec<String>,
    /// Sampling values of the last `G_ProgJointList` request.
    pub last_discretization: Vec<f64>,
}

impl HostState {
    fn with_station() -> Self {
        let mut state = Self {
            next_handle: 100,
            ..Self::default()
        };
        state
            .items
            .insert(STATION, MockItem::new("Cell", ItemType::Station, 0));
        let mut robot = MockItem::new("UR10", ItemType::Robot, STATION);
        robot.joints = HOME_JOINTS.to_vec();
        state.items.insert(ROBOT, robot);
        state
            .items
            .insert(TABLE, MockItem::new("Table", ItemType::Frame, STATION));
        let mut home = MockItem::new("Home", ItemType::Target, TABLE);
        home.joints = HOME_JOINTS.to_vec();
        state.items.insert(HOME, home);
        state
    }

    pub fn add(&mut self, name: &str, item_type: ItemType, parent: u64) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        let parent = if parent == 0 { STATION } else { parent };
        self.items
            .insert(handle, MockItem::new(name, item_type, parent));
        handle
    }

    pub fn raw(&self, handle: u64) -> RawItem {
        self.items
            .get(&handle)
            .map_or(RawItem::NONE, |item| RawItem::new(handle, item.item_type))
    }

    pub fn find(&self, name: &str) -> Option<u64> {
        self.items
            .iter()
            .find(|(_, item)| item.name == name)
            .map(|(handle, _)| *handle)
    }

    fn children(&self, parent: u64) -> Vec<RawItem> {
        self.items
            .iter()
            .filter(|(_, item)| item.parent == parent)
            .map(|(handle, item)| RawItem::new(*handle, item.item_type))
            .collect()
    }

    fn remove(&mut self, handle: u64) {
        let children: Vec<u64> = self.children(handle).iter().map(|r| r.handle).collect();
        for child in children {
            self.remove(child);
        }
        self.items.remove(&handle);
    }
}

/// Blocking field reader/writer over one socket.
struct HostConn {
    stream: TcpStream,
    rbuf: BytesMut,
}

impl HostConn {
    fn read<T: Decode>(&mut self) -> Option<T> {
        loop {
            if let Some(value) = decode_buffered::<T>(&mut self.rbuf).ok()? {
                return Some(value);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).ok()?;
            if n == 0 {
                return None;
            }
            self.rbuf.extend_from_slice(&chunk[..n]);
        }
    }

    fn write<T: Encode + ?Sized>(&mut self, value: &T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf).unwrap();
        let _ = self.stream.write_all(&buf);
    }

    fn ok(&mut self) {
        self.write(&0i32);
    }

    fn fail(&mut self, status: i32, message: &str) {
        self.write(&status);
        self.write(message);
    }

    fn stale(&mut self) {
        self.fail(1, "invalid item");
    }
}

pub struct MockHost {
    pub port: u16,
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    /// Station `Cell` with robot `UR10`, frame `Table` and target `Home`.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(HostState::with_station()));

        let shared = state.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let _ = stream.set_nodelay(true);
                let shared = shared.clone();
                thread::spawn(move || {
                    serve(
                        HostConn {
                            stream,
                            rbuf: BytesMut::new(),
                        },
                        &shared,
                    );
                });
            }
        });

        Self { port, state }
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig::at("127.0.0.1", self.port)
    }

    pub fn client(&self) -> Client {
        Client::new(self.config())
    }

    pub fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    /// Program whose simulation yields `samples`, `code` and `message`.
    pub fn program_with_joint_list(&self, name: &str, samples: Mat, code: i32, message: &str) -> u64 {
        let mut state = self.state();
        let handle = state.add(name, ItemType::Program, 0);
        if let Some(program) = state.items.get_mut(&handle) {
            program.joint_list = Some((samples, code, message.to_string()));
        }
        handle
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().log.clone()
    }
}

fn serve(mut conn: HostConn, shared: &Mutex<HostState>) {
    let Some(greeting) = conn.read::<String>() else {
        return;
    };
    assert_eq!(greeting, "CMD_START");
    conn.write("READY");
    conn.write(&1i32);
    conn.ok();

    while let Some(command) = conn.read::<String>() {
        shared.lock().unwrap().log.push(command.clone());
        let handled = match command.as_str() {
            "RDK_EVT" | "RDK_EVT_FILTER" => {
                serve_events(&mut conn, shared, &command);
                return;
            }
            _ => handle(&mut conn, shared, &command),
        };
        if handled.is_none() {
            return;
        }
    }
}

fn serve_events(conn: &mut HostConn, shared: &Mutex<HostState>, command: &str) {
    if command == "RDK_EVT_FILTER" {
        let Some(n) = conn.read::<i32>() else { return };
        let mut ids = Vec::new();
        for _ in 0..n {
            let Some(id) = conn.read::<i32>() else { return };
            ids.push(id);
        }
        shared.lock().unwrap().event_filters.push(ids);
    }
    conn.write(command);
    conn.write(&1i32);
    conn.ok();

    // Every scripted event goes out regardless of the filter.
    let events = shared.lock().unwrap().events.clone();
    for event in &events {
        conn.write(event);
    }
    let _ = conn.stream.flush();
}

#[allow(clippy::too_many_lines)]
fn handle(conn: &mut HostConn, shared: &Mutex<HostState>, command: &str) -> Option<()> {
    match command {
        "G_Version" => {
            conn.write("simhost-mock 1.0");
            conn.ok();
        }
        "G_Item2" => {
            let name: String = conn.read()?;
            let item_type: i32 = conn.read()?;
            let st = shared.lock().unwrap();
            let raw = st
                .items
                .iter()
                .find(|(_, it)| it.name == name && (item_type < 0 || it.item_type.code() == item_type))
                .map_or(RawItem::NONE, |(h, it)| RawItem::new(*h, it.item_type));
            drop(st);
            conn.write(&raw);
            conn.ok();
        }
        "G_List_Items_ptr" => {
            let item_type: i32 = conn.read()?;
            let st = shared.lock().unwrap();
            let list: Vec<RawItem> = st
                .items
                .iter()
                .filter(|(_, it)| item_type < 0 || it.item_type.code() == item_type)
                .map(|(h, it)| RawItem::new(*h, it.item_type))
                .collect();
            drop(st);
            conn.write(&ItemList(list));
            conn.ok();
        }
        "G_ActiveStn" => {
            let raw = shared.lock().unwrap().raw(STATION);
            conn.write(&raw);
            conn.ok();
        }
        "Render" => {
            let on: i32 = conn.read()?;
            shared.lock().unwrap().render.push(on != 0);
            conn.ok();
        }
        "SCMD" => {
            let cmd: String = conn.read()?;
            let value: String = conn.read()?;
            conn.write(&format!("{cmd}={value}"));
            conn.ok();
        }
        "G_ParamV" => {
            let name: String = conn.read()?;
            let value = shared.lock().unwrap().params.get(&name).cloned().unwrap_or_default();
            conn.write(&value);
            conn.ok();
        }
        "S_ParamV" => {
            let name: String = conn.read()?;
            let value: ParamValue = conn.read()?;
            let mut st = shared.lock().unwrap();
            if value.is_none() {
                st.params.remove(&name);
            } else {
                st.params.insert(name, value);
            }
            drop(st);
            conn.ok();
        }
        "Add_FRAME" | "Add_PROG" | "Add_TARGET" => {
            let name: String = conn.read()?;
            let parent: RawItem = conn.read()?;
            if command == "Add_TARGET" {
                let _robot: RawItem = conn.read()?;
            }
            let item_type = match command {
                "Add_FRAME" => ItemType::Frame,
                "Add_PROG" => ItemType::Program,
                _ => ItemType::Target,
            };
            let mut st = shared.lock().unwrap();
            let parent = if item_type == ItemType::Program { 0 } else { parent.handle };
            let handle = st.add(&name, item_type, parent);
            let raw = st.raw(handle);
            drop(st);
            conn.write(&raw);
            conn.ok();
        }
        _ => return handle_item(conn, shared, command),
    }
    Some(())
}

enum Args {
    None,
    Text(String),
    Text2(String, String),
    Values(Vec<f64>),
    Pose(Pose),
    Param(String, ParamValue),
    Float(f64),
    Item(RawItem),
    Code(String, i32),
    Move(i32, Vec<RawItem>),
    WaitDi(String, String, f64),
    JointList(Vec<f64>, String),
}

/// Commands whose first argument is the item they act on.
#[allow(clippy::too_many_lines)]
fn handle_item(conn: &mut HostConn, shared: &Mutex<HostState>, command: &str) -> Option<()> {
    // MoveX carries its item last.
    if command == "MoveX" {
        let move_type: i32 = conn.read()?;
        let count = if move_type == 3 { 2 } else { 1 };
        let mut last_joints = None;
        for _ in 0..count {
            match conn.read::<i32>()? {
                1 => last_joints = Some(conn.read::<Vec<f64>>()?),
                2 => {
                    let _: Pose = conn.read()?;
                }
                _ => {
                    let _: RawItem = conn.read()?;
                }
            }
        }
        let robot: RawItem = conn.read()?;
        let mut st = shared.lock().unwrap();
        let Some(item) = st.items.get_mut(&robot.handle) else {
            drop(st);
            conn.stale();
            return Some(());
        };
        if let Some(joints) = last_joints {
            item.joints = joints;
        }
        drop(st);
        conn.ok();
        return Some(());
    }

    let raw: RawItem = conn.read()?;
    let handle = raw.handle;

    // Read the remaining arguments before touching the state, so a stale
    // handle never leaves unread bytes behind.
    let args = match command {
        "S_Name" | "G_ItmParamV" => Args::Text(conn.read()?),
        "ICMD" | "setDO" | "InsCustom2" => Args::Text2(conn.read()?, conn.read()?),
        "S_Thetas" | "S_Speed4" => Args::Values(conn.read()?),
        "S_Hlocal" => Args::Pose(conn.read()?),
        "S_ItmParamV" => Args::Param(conn.read()?, conn.read()?),
        "RunPause" | "S_ZoneData" => Args::Float(conn.read()?),
        "S_Parent" => Args::Item(conn.read()?),
        "RunCode2" => Args::Code(conn.read()?, conn.read()?),
        "Add_INSMOVE" => {
            let move_type: i32 = conn.read()?;
            let count = if move_type == 3 { 2 } else { 1 };
            let mut targets: Vec<RawItem> = Vec::new();
            for _ in 0..count {
                targets.push(conn.read()?);
            }
            Args::Move(move_type, targets)
        }
        "waitDI" => Args::WaitDi(conn.read()?, conn.read()?, conn.read()?),
        "G_ProgJointList" => {
            Args::JointList(conn.read()?, conn.read()?)
        }
        _ => Args::None,
    };

    let mut st = shared.lock().unwrap();
    if command == "Exists" {
        let exists = i32::from(st.items.contains_key(&handle));
        drop(st);
        conn.write(&exists);
        conn.ok();
        return Some(());
    }
    if !st.items.contains_key(&handle) {
        drop(st);
        conn.stale();
        return Some(());
    }

    match (command, args) {
        ("G_Name", _) => {
            let name = st.items[&handle].name.clone();
            drop(st);
            conn.write(&name);
        }
        ("S_Name", Args::Text(name)) => {
            st.items.get_mut(&handle)?.name = name;
        }
        ("G_Type", _) => {
            let code = st.items[&handle].item_type.code();
            drop(st);
            conn.write(&code);
        }
        ("G_Parent", _) => {
            let parent = st.raw(st.items[&handle].parent);
            drop(st);
            conn.write(&parent);
        }
        ("G_Childs", _) => {
            let children = st.children(handle);
            drop(st);
            conn.write(&ItemList(children));
        }
        ("S_Parent", Args::Item(parent)) => {
            st.items.get_mut(&handle)?.parent = parent.handle;
        }
        ("Remove", _) => st.remove(handle),
        ("G_Thetas", _) => {
            let joints = st.items[&handle].joints.clone();
            drop(st);
            conn.write(&joints);
        }
        ("S_Thetas", Args::Values(joints)) => {
            let item = st.items.get_mut(&handle)?;
            if item.joints.len() != joints.len() {
                drop(st);
                conn.fail(3, "wrong number of joints");
                return Some(());
            }
            item.joints = joints;
        }
        ("G_Hlocal", _) => {
            let pose = st.items[&handle].pose;
            drop(st);
            conn.write(&pose);
        }
        ("S_Hlocal", Args::Pose(pose)) => st.items.get_mut(&handle)?.pose = pose,
        ("S_Speed4" | "S_ZoneData" | "Stop", _) => {}
        ("WaitMove", _) => {
            // Request accepted; the final status below ends the motion.
            drop(st);
            conn.ok();
        }
        ("IsBusy", _) => {
            drop(st);
            conn.write(&0i32);
        }
        ("G_ItmParamV", Args::Text(name)) => {
            let value = st.items[&handle]
                .params
                .get(&name)
                .cloned()
                .unwrap_or_default();
            drop(st);
            conn.write(&value);
        }
        ("S_ItmParamV", Args::Param(name, value)) => {
            let params = &mut st.items.get_mut(&handle)?.params;
            if value.is_none() {
                params.remove(&name);
            } else {
                params.insert(name, value);
            }
        }
        ("ICMD", Args::Text2(cmd, value)) => {
            drop(st);
            conn.write(&format!("{cmd}:{value}"));
        }
        ("RunPause", Args::Float(ms)) => {
            st.items.get_mut(&handle)?.instructions.push(format!("pause {ms}"));
        }
        ("RunCode2", Args::Code(code, run_type)) => {
            st.items
                .get_mut(&handle)?
                .instructions
                .push(format!("code{run_type} {code}"));
        }
        ("setDO", Args::Text2(io, value)) => {
            st.items
                .get_mut(&handle)?
                .instructions
                .push(format!("setDO {io}={value}"));
        }
        ("waitDI", Args::WaitDi(io, value, timeout)) => {
            st.items
                .get_mut(&handle)?
                .instructions
                .push(format!("waitDI {io}={value} {timeout}"));
        }
        ("InsCustom2", Args::Text2(code, name)) => {
            st.items
                .get_mut(&handle)?
                .instructions
                .push(format!("custom {name}: {code}"));
        }
        ("Add_INSMOVE", Args::Move(move_type, targets)) => {
            let names: Vec<String> = targets
                .iter()
                .map(|t| st.items.get(&t.handle).map_or("?".into(), |it| it.name.clone()))
                .collect();
            st.items
                .get_mut(&handle)?
                .instructions
                .push(format!("move{move_type} {}", names.join(" ")));
        }
        ("Prog_Nins", _) => {
            let n = i32::try_from(st.items[&handle].instructions.len()).unwrap();
            drop(st);
            conn.write(&n);
        }
        ("G_ProgJointList", Args::JointList(disc, save_to)) => {
            st.last_discretization = disc;
            let reply = st.items[&handle].joint_list.clone();
            drop(st);
            let (mut samples, code, message) =
                reply.unwrap_or_else(|| (Mat::zeros(0, 0), -1, "program has no moves".into()));
            // Samples written to a file are not sent back.
            if !save_to.is_empty() {
                samples = Mat::zeros(0, 0);
            }
            conn.write(&samples);
            conn.write(&code);
            conn.write(&message);
        }
        (other, _) => {
            drop(st);
            conn.fail(-3, &format!("mock host does not handle {other}"));
            return Some(());
        }
    }
    conn.ok();
    Some(())
}

/// One sample column in `Detail::Timed` layout.
fn timed_column(
    joints: &[f64],
    error: f64,
    mm_step: f64,
    deg_step: f64,
    move_id: usize,
    time_step: f64,
    tcp: [f64; 3],
) -> Vec<f64> {
    let mut col = joints.to_vec();
    #[allow(clippy::cast_precision_loss)]
    col.extend([error, mm_step, deg_step, move_id as f64, time_step]);
    col.extend(tcp);
    col
}

/// Builds a sampled program move by move.
pub struct TrajectoryBuilder {
    columns: Vec<Vec<f64>>,
    joints: Vec<f64>,
    tcp: [f64; 3],
    max_mm: f64,
    time_step: f64,
    moves: usize,
}

impl TrajectoryBuilder {
    pub fn new(joints: &[f64], tcp: [f64; 3], max_mm: f64, time_step: f64) -> Self {
        Self {
            columns: Vec::new(),
            joints: joints.to_vec(),
            tcp,
            max_mm,
            time_step,
            moves: 0,
        }
    }

    /// Straight TCP path to `to`, never stepping more than `max_mm`.
    /// `stop` ends the move with a zero time step (exact stop point).
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn linear(mut self, to: [f64; 3], stop: bool) -> Self {
        self.moves += 1;
        let from = self.tcp;
        let length = simhost_math::vector::distance(&from, &to);
        let steps = ((length / self.max_mm).ceil() as usize).max(1);
        let mm_step = length / steps as f64;
        for k in 1..=steps {
            let t = k as f64 / steps as f64;
            let tcp = [
                from[0] + (to[0] - from[0]) * t,
                from[1] + (to[1] - from[1]) * t,
                from[2] + (to[2] - from[2]) * t,
            ];
            for j in &mut self.joints {
                *j += 0.01;
            }
            let time_step = if stop && k == steps { 0.0 } else { self.time_step };
            self.columns.push(timed_column(
                &self.joints,
                0.0,
                mm_step,
                0.01,
                self.moves,
                time_step,
                tcp,
            ));
        }
        self.tcp = to;
        self
    }

    /// Reorientation without moving the TCP, in `steps` samples.
    pub fn rotate(mut self, steps: usize, deg_step: f64) -> Self {
        self.moves += 1;
        for _ in 0..steps {
            self.joints[5] += deg_step;
            self.columns.push(timed_column(
                &self.joints,
                0.0,
                0.0,
                deg_step,
                self.moves,
                self.time_step,
                self.tcp,
            ));
        }
        self
    }

    /// Mark the last `n` samples with path error bits.
    pub fn flag_last(mut self, n: usize, bits: u32) -> Self {
        let dof = self.joints.len();
        let len = self.columns.len();
        for col in &mut self.columns[len.saturating_sub(n)..] {
            col[dof] = f64::from(bits);
        }
        self
    }

    pub fn moves(&self) -> usize {
        self.moves
    }

    pub fn build(&self) -> Mat {
        let rows = self.columns.first().map_or(0, Vec::len);
        let data: Vec<f64> = self.columns.iter().flatten().copied().collect();
        Mat::from_col_major(rows, self.columns.len(), &data).unwrap()
    }
}

/// An event of `event_type` carrying a payload of the right shape.
pub fn event_for(event_type: EventType, item: RawItem) -> Event {
    let payload = match event_type {
        EventType::Selection3dChanged | EventType::Selection3dClick => {
            EventPayload::Selection3d(Selection3d {
                pose: Pose::transl(10.0, 20.0, 30.0),
                xyz: [1.0, 2.0, 3.0],
                ijk: [0.0, 0.0, 1.0],
                feature_type: 1,
                feature_id: 4,
            })
        }
        EventType::Key => EventPayload::Key(KeyEvent {
            pressed: true,
            key: 65,
            modifiers: 0,
        }),
        EventType::ItemMovedPose => EventPayload::MovedPose {
            pose: Pose::transl(0.0, 0.0, 5.0),
            extra: vec![1.5],
        },
        EventType::CalibMeasurement => EventPayload::Calibration {
            values: vec![0.0, 3.0, 0.25],
        },
        EventType::ItemVisibility => EventPayload::Visibility {
            object: true,
            frame: false,
        },
        EventType::ProgSliderChanged | EventType::ProgSliderSet => EventPayload::Slider { index: 7 },
        _ => EventPayload::None,
    };
    Event {
        event_type,
        item,
        payload,
    }
}
