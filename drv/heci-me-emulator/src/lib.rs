// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An emulated HECI function, ME side included, for exercising the
//! transport on a development host.
//!
//! [`MeEmulator`] implements every platform trait the transport needs. It
//! answers PCI configuration cycles for one function, decodes the four HECI
//! registers at whatever BAR0 is programmed to, and plays the ME: it drains
//! the host ring when the host raises InterruptGenerate, reassembles
//! messages, optionally answers them, and runs its half of the reset
//! handshake. Delays are counted, never slept.
//!
//! Misbehavior is opt-in through the fault knobs (`signal_reset`,
//! `drop_ready_after_write`, `corrupt_me_pointers` and friends), and an
//! ordered [`Event`] log records the handshake as the ME saw it.

mod firmware;
mod ring;

use std::collections::VecDeque;

use drv_heci_api::pci::{
    BAR_ADDRESS_MASK, BAR_TYPE_64, COMMAND_MEMORY_SPACE, INTEL_VENDOR_ID,
    PCI_BAR0, PCI_BAR0_HIGH, PCI_COMMAND, PCI_HFSTS1, PCI_VENDOR_ID,
};
use drv_heci_api::{
    Csr, Delay, DeviceEnable, HeciFunction, MessageHeader, Mmio, PciConfig,
    H_CB_WW, H_CSR, ME_CB_RW, ME_CSR_HA, MAX_FRAGMENT_WORDS,
};

pub use firmware::MkhiFirmware;
pub use ring::WordRing;

pub const HECI_DEVICE_ID: u16 = 0x7e70;
pub const DEFAULT_DEPTH: u8 = 0x80;
/// HFSTS1 of an ME in normal operation with init complete and no error.
pub const HEALTHY_FWSTS: u32 = 0x0000_0205;

/// A complete message, in either direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub me_addr: u8,
    pub host_addr: u8,
    pub data: Vec<u8>,
}

/// Things the ME observed or did, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    HostResetAsserted,
    HostReadyCleared,
    MeReadyAsserted,
    HostInterruptStatusSet,
    HostReadyAsserted,
    InterruptGenerate,
    /// A packet taken out of the host ring.
    PacketToMe(MessageHeader),
}

type Responder = Box<dyn FnMut(&Message) -> Option<Vec<u8>>>;

pub struct MeEmulator {
    function: HeciFunction,
    present: bool,
    enabled: bool,
    command: u32,
    bar_lo: u32,
    bar_hi: u32,
    fwsts: u32,

    host_ie: bool,
    host_is: bool,
    host_ready: bool,
    host_reset: bool,
    me_ready: bool,
    me_reset: bool,
    host_ring: WordRing,
    me_ring: WordRing,
    ring_origin: u8,

    assembling: Option<Message>,
    inbox: Vec<Message>,
    host_packets: Vec<MessageHeader>,
    outbox: VecDeque<Vec<u32>>,
    responder: Option<Responder>,

    resetting: bool,
    ready_after_reset: Option<u32>,
    reset_countdown: Option<u32>,
    loopback: bool,
    stall_host_ring: bool,
    trickle: bool,
    drop_ready_after_write: bool,
    drop_ready_after_read: bool,
    reply_latency: u32,
    latency_left: u32,

    delays: u32,
    elapsed_us: u64,
    me_csr_reads: u32,
    enable_writes: u32,
    events: Vec<Event>,
}

impl MeEmulator {
    /// A present, enabled, healthy function whose ME is ready, whose host
    /// side is not, and whose BAR0 is unprogrammed.
    pub fn new(function: HeciFunction) -> Self {
        Self {
            function,
            present: true,
            enabled: true,
            command: 0,
            bar_lo: 0,
            bar_hi: 0,
            fwsts: HEALTHY_FWSTS,

            host_ie: false,
            host_is: false,
            host_ready: false,
            host_reset: false,
            me_ready: true,
            me_reset: false,
            host_ring: WordRing::new(DEFAULT_DEPTH),
            me_ring: WordRing::new(DEFAULT_DEPTH),
            ring_origin: 0,

            assembling: None,
            inbox: Vec::new(),
            host_packets: Vec::new(),
            outbox: VecDeque::new(),
            responder: None,

            resetting: false,
            ready_after_reset: Some(0),
            reset_countdown: None,
            loopback: false,
            stall_host_ring: false,
            trickle: false,
            drop_ready_after_write: false,
            drop_ready_after_read: false,
            reply_latency: 0,
            latency_left: 0,

            delays: 0,
            elapsed_us: 0,
            me_csr_reads: 0,
            enable_writes: 0,
            events: Vec::new(),
        }
    }

    pub fn with_depths(mut self, host: u8, me: u8) -> Self {
        self.host_ring = WordRing::new(host);
        self.me_ring = WordRing::new(me);
        self.host_ring.reset_to(self.ring_origin);
        self.me_ring.reset_to(self.ring_origin);
        self
    }

    /// Starts both rings, and restarts them after each reset, with their
    /// pointers at `origin`.
    pub fn with_ring_origin(mut self, origin: u8) -> Self {
        self.ring_origin = origin;
        self.host_ring.reset_to(origin);
        self.me_ring.reset_to(origin);
        self
    }

    /// BAR0 as firmware left it.
    pub fn with_bar(mut self, base: u64) -> Self {
        self.bar_lo = base as u32 & BAR_ADDRESS_MASK;
        self.bar_hi = (base >> 32) as u32;
        self
    }

    pub fn with_firmware_status(mut self, fwsts: u32) -> Self {
        self.fwsts = fwsts;
        self
    }

    /// No function at all: every configuration read returns all-ones.
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    /// Hidden by the chipset until enabled through [`DeviceEnable`].
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Number of `ME_CSR_HA` reads, after the host asserts Reset, that
    /// still show the ME not ready. `None` keeps the ME down forever.
    pub fn with_ready_after_reset(mut self, reads: Option<u32>) -> Self {
        self.ready_after_reset = reads;
        self
    }

    /// Called with every complete message the host sends; whatever it
    /// returns is queued back to the host.
    pub fn with_responder(
        mut self,
        responder: impl FnMut(&Message) -> Option<Vec<u8>> + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Echoes every host packet back, header and all.
    pub fn with_loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    pub fn set_me_ready(&mut self, ready: bool) {
        self.me_ready = ready;
    }

    /// The ME asks for a reset: Ready drops and Reset rises.
    pub fn signal_reset(&mut self) {
        self.me_ready = false;
        self.me_reset = true;
    }

    /// Leave the host ring alone on InterruptGenerate.
    pub fn stall_host_ring(&mut self, stall: bool) {
        self.stall_host_ring = stall;
    }

    /// Deliver queued words one per `ME_CSR_HA` read instead of a packet
    /// at a time.
    pub fn set_trickle(&mut self, trickle: bool) {
        self.trickle = trickle;
    }

    /// Drop ME Ready after the next packet the host writes.
    pub fn drop_ready_after_write(&mut self) {
        self.drop_ready_after_write = true;
    }

    /// Drop ME Ready on the next read of the ME ring.
    pub fn drop_ready_after_read(&mut self) {
        self.drop_ready_after_read = true;
    }

    /// Holds each reply back until this many `ME_CSR_HA` reads have gone
    /// by.
    pub fn set_reply_latency(&mut self, reads: u32) {
        self.reply_latency = reads;
    }

    pub fn corrupt_me_pointers(&mut self, read: u8, write: u8) {
        self.me_ring.set_pointers(read, write);
    }

    /// Queues `data` to the host, fragmented to fit the ME ring.
    pub fn queue_message(&mut self, host_addr: u8, me_addr: u8, data: &[u8]) {
        let max_words = usize::from(self.me_ring.depth())
            .saturating_sub(1)
            .clamp(1, MAX_FRAGMENT_WORDS);
        let mut rest = data;
        loop {
            let n = rest.len().min(max_words * 4);
            let (fragment, tail) = rest.split_at(n);
            let complete = tail.is_empty();
            let header =
                MessageHeader::new(me_addr, host_addr, n as u16, complete);
            let mut packet = vec![header.bits()];
            packet.extend(fragment.chunks(4).map(|c| {
                let mut le = [0u8; 4];
                le[..c.len()].copy_from_slice(c);
                u32::from_le_bytes(le)
            }));
            self.outbox.push_back(packet);
            if complete {
                break;
            }
            rest = tail;
        }
        self.refill();
    }

    /// Queues arbitrary words as one packet, header first, with no checks.
    pub fn queue_raw_packet(&mut self, words: &[u32]) {
        self.outbox.push_back(words.to_vec());
        self.refill();
    }

    pub fn inbox(&self) -> &[Message] {
        &self.inbox
    }

    pub fn take_inbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.inbox)
    }

    /// Headers of every packet taken from the host ring.
    pub fn host_packets(&self) -> &[MessageHeader] {
        &self.host_packets
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn delays(&self) -> u32 {
        self.delays
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    pub fn me_csr_reads(&self) -> u32 {
        self.me_csr_reads
    }

    pub fn enable_writes(&self) -> u32 {
        self.enable_writes
    }

    pub fn host_ready(&self) -> bool {
        self.host_ready
    }

    pub fn me_ready(&self) -> bool {
        self.me_ready
    }

    pub fn bar(&self) -> u64 {
        (u64::from(self.bar_hi) << 32) | u64::from(self.bar_lo)
    }

    pub fn command(&self) -> u32 {
        self.command
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn host_ring(&self) -> &WordRing {
        &self.host_ring
    }

    pub fn me_ring(&self) -> &WordRing {
        &self.me_ring
    }

    fn decodes(&self) -> bool {
        self.present && self.enabled && self.command & COMMAND_MEMORY_SPACE != 0
    }

    fn host_csr(&self) -> Csr {
        let mut csr = Csr::from_bits(0);
        csr.set_interrupt_enable(self.host_ie);
        csr.set_interrupt_status(self.host_is);
        csr.set_ready(self.host_ready);
        csr.set_reset(self.host_reset);
        csr.set_read_pointer(self.host_ring.read_pointer());
        csr.set_write_pointer(self.host_ring.write_pointer());
        csr.set_depth(self.host_ring.depth());
        csr
    }

    fn read_me_csr(&mut self) -> Csr {
        self.me_csr_reads += 1;
        if self.resetting {
            match self.reset_countdown {
                Some(0) => self.finish_reset(),
                Some(n) => self.reset_countdown = Some(n - 1),
                None => (),
            }
        }
        if self.latency_left > 0 {
            self.latency_left -= 1;
            if self.latency_left == 0 {
                self.refill();
            }
        }
        if self.trickle {
            self.trickle_one();
        }

        let mut csr = Csr::from_bits(0);
        csr.set_ready(self.me_ready);
        csr.set_reset(self.me_reset);
        csr.set_read_pointer(self.me_ring.read_pointer());
        csr.set_write_pointer(self.me_ring.write_pointer());
        csr.set_depth(self.me_ring.depth());
        csr
    }

    fn write_host_csr(&mut self, value: u32) {
        let v = Csr::from_bits(value);
        if v.interrupt_status() {
            self.host_is = false;
        }
        self.host_ie = v.interrupt_enable();

        if v.reset() {
            if !self.host_reset {
                self.begin_reset();
            }
            return;
        }

        self.host_reset = false;
        if v.ready() && !self.host_ready {
            self.events.push(Event::HostReadyAsserted);
        }
        self.host_ready = v.ready();

        if v.interrupt_generate() && self.host_ready {
            self.events.push(Event::InterruptGenerate);
            self.service();
        }
    }

    fn begin_reset(&mut self) {
        self.events.push(Event::HostResetAsserted);
        self.host_reset = true;
        self.host_ready = false;
        self.events.push(Event::HostReadyCleared);
        self.host_is = false;

        self.me_ready = false;
        self.me_reset = false;
        self.host_ring.reset_to(self.ring_origin);
        self.me_ring.reset_to(self.ring_origin);
        self.outbox.clear();
        self.assembling = None;
        self.latency_left = 0;

        self.resetting = true;
        self.reset_countdown = self.ready_after_reset;
    }

    fn finish_reset(&mut self) {
        self.resetting = false;
        self.reset_countdown = None;
        self.me_ready = true;
        self.events.push(Event::MeReadyAsserted);
        self.host_is = true;
        self.events.push(Event::HostInterruptStatusSet);
    }

    /// The ME's reaction to InterruptGenerate.
    fn service(&mut self) {
        let mut drained = false;
        while !self.stall_host_ring {
            let Some(raw) = self.host_ring.peek(0) else {
                break;
            };
            let header = MessageHeader::from_bits(raw);
            let words = header.len_words();
            if self.host_ring.filled() < words + 1 {
                break;
            }
            self.host_ring.pop();
            let payload: Vec<u32> =
                (0..words).filter_map(|_| self.host_ring.pop()).collect();

            drained = true;
            self.events.push(Event::PacketToMe(header));
            self.host_packets.push(header);

            if self.loopback {
                let mut packet = vec![header.bits()];
                packet.extend(payload);
                self.outbox.push_back(packet);
            } else {
                self.absorb(header, &payload);
            }
        }

        if drained && self.drop_ready_after_write {
            self.drop_ready_after_write = false;
            self.me_ready = false;
        }
        self.refill();
    }

    fn absorb(&mut self, header: MessageHeader, payload: &[u32]) {
        let mut bytes: Vec<u8> =
            payload.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.truncate(usize::from(header.length()));

        let msg = self.assembling.get_or_insert_with(|| Message {
            me_addr: header.me_address(),
            host_addr: header.host_address(),
            data: Vec::new(),
        });
        msg.data.extend_from_slice(&bytes);

        if !header.message_complete() {
            return;
        }
        let Some(msg) = self.assembling.take() else {
            return;
        };
        let reply = self.responder.as_mut().and_then(|r| r(&msg));
        self.inbox.push(msg.clone());
        if let Some(reply) = reply {
            self.latency_left = self.reply_latency;
            self.queue_message(msg.host_addr, msg.me_addr, &reply);
        }
    }

    /// Moves whole queued packets into the ME ring while they fit.
    fn refill(&mut self) {
        if self.trickle || self.latency_left > 0 {
            return;
        }
        let mut moved = false;
        while let Some(packet) = self.outbox.front() {
            if packet.len() > self.me_ring.free() {
                break;
            }
            for &w in packet {
                self.me_ring.push(w);
            }
            self.outbox.pop_front();
            moved = true;
        }
        if moved {
            self.host_is = true;
        }
    }

    fn trickle_one(&mut self) {
        if self.latency_left > 0 || self.me_ring.free() == 0 {
            return;
        }
        let Some(packet) = self.outbox.front_mut() else {
            return;
        };
        if !packet.is_empty() {
            let w = packet.remove(0);
            self.me_ring.push(w);
            self.host_is = true;
        }
        if packet.is_empty() {
            self.outbox.pop_front();
        }
    }

    fn read_window(&mut self) -> u32 {
        let word = self.me_ring.pop().unwrap_or(u32::MAX);
        if self.drop_ready_after_read {
            self.drop_ready_after_read = false;
            self.me_ready = false;
        }
        self.refill();
        word
    }

    fn offset(&self, addr: u64) -> Option<u64> {
        if !self.decodes() {
            return None;
        }
        addr.checked_sub(self.bar()).filter(|off| *off < 0x10)
    }
}

impl PciConfig for MeEmulator {
    fn config_read32(&mut self, function: HeciFunction, offset: u16) -> u32 {
        if function != self.function || !self.present || !self.enabled {
            return u32::MAX;
        }
        match offset {
            PCI_VENDOR_ID => {
                (u32::from(HECI_DEVICE_ID) << 16) | u32::from(INTEL_VENDOR_ID)
            }
            PCI_COMMAND => self.command,
            PCI_BAR0 => self.bar_lo | BAR_TYPE_64,
            PCI_BAR0_HIGH => self.bar_hi,
            PCI_HFSTS1 => self.fwsts,
            _ => 0,
        }
    }

    fn config_write32(&mut self, function: HeciFunction, offset: u16, value: u32) {
        if function != self.function || !self.present || !self.enabled {
            return;
        }
        match offset {
            PCI_COMMAND => self.command = value & 0xffff,
            PCI_BAR0 => self.bar_lo = value & BAR_ADDRESS_MASK,
            PCI_BAR0_HIGH => self.bar_hi = value,
            _ => (),
        }
    }
}

impl Mmio for MeEmulator {
    fn mmio_read32(&mut self, addr: u64) -> u32 {
        match self.offset(addr) {
            Some(H_CSR) => self.host_csr().bits(),
            Some(ME_CB_RW) => self.read_window(),
            Some(ME_CSR_HA) => self.read_me_csr().bits(),
            _ => u32::MAX,
        }
    }

    fn mmio_write32(&mut self, addr: u64, value: u32) {
        match self.offset(addr) {
            Some(H_CB_WW) => {
                // A full ring drops the word, as the hardware does.
                self.host_ring.push(value);
            }
            Some(H_CSR) => self.write_host_csr(value),
            _ => (),
        }
    }
}

impl Delay for MeEmulator {
    fn delay_us(&mut self, us: u32) {
        self.delays += 1;
        self.elapsed_us += u64::from(us);
    }
}

impl DeviceEnable for MeEmulator {
    fn is_function_enabled(&mut self, function: HeciFunction) -> bool {
        function == self.function && self.enabled
    }

    fn set_function_enabled(&mut self, function: HeciFunction, enabled: bool) {
        if function == self.function {
            self.enable_writes += 1;
            self.enabled = enabled;
        }
    }
}
