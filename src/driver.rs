//! nRF24L01+ register driver for both ends of the keyboard link.
//!
//! This module provides the [`Nrf24`] struct, which owns the transceiver's SPI device,
//! its chip-enable (`CE`) output and its active-low interrupt (`IRQ`) input, and
//! implements [`Link`] for the keyboard (primary transmitter) and [`Listener`] for the
//! dongle (primary receiver).
//!
//! Both roles share one configuration, applied by [`Nrf24::init`]:
//!
//! - 5-byte addresses, TX address and pipe 0 both set to the dongle address
//! - 2-byte CRC, auto-acknowledge on pipe 0
//! - dynamic payload length with ACK payloads
//! - 15 hardware retransmits, 250 µs apart
//! - 2 Mbps at the configured output power
//!
//! The transmitter keeps the radio powered down between transactions.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kbdlink::driver::{Nrf24, RadioConfig};
//!
//! let mut radio = Nrf24::new(spi, ce, irq, RadioConfig::default());
//! radio.init()?;
//! ```
//!
//! Every SPI exchange is a single `transfer_in_place` of the command byte followed by
//! its data bytes; the first byte clocked back is the STATUS register.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::consts::{
    AUTO_RETRANSMIT_COUNT, AUTO_RETRANSMIT_DELAY_US, DONGLE_ADDRESS, MAX_PAYLOAD_LEN, RF_CHANNEL,
};
use crate::error::Error;
use crate::fmt::{debug, info, trace, warn};
use crate::link::{Link, Listener, RadioStats, SendOutcome};
use crate::message::Frame;

/// SPI commands.
pub mod cmd {
    /// Read register (OR with the register address).
    pub const R_REGISTER: u8 = 0x00;
    /// Write register (OR with the register address).
    pub const W_REGISTER: u8 = 0x20;
    /// Width of the payload at the head of the RX FIFO.
    pub const R_RX_PL_WID: u8 = 0x60;
    /// Read the payload at the head of the RX FIFO.
    pub const R_RX_PAYLOAD: u8 = 0x61;
    /// Load a TX payload.
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    /// Load an ACK payload (OR with the pipe number).
    pub const W_ACK_PAYLOAD: u8 = 0xA8;
    /// Empty the TX FIFO.
    pub const FLUSH_TX: u8 = 0xE1;
    /// Empty the RX FIFO.
    pub const FLUSH_RX: u8 = 0xE2;
    /// No operation, clocks out STATUS.
    pub const NOP: u8 = 0xFF;
}

/// Register addresses and bits.
#[allow(missing_docs)]
pub mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const EN_CRC: u8 = 0x08;
    pub const CRCO: u8 = 0x04;
    pub const PWR_UP: u8 = 0x02;
    pub const PRIM_RX: u8 = 0x01;

    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const AW_5_BYTES: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;

    pub const RF_SETUP: u8 = 0x06;
    pub const RF_DR_2MBPS: u8 = 0x08;

    pub const STATUS: u8 = 0x07;
    pub const RX_DR: u8 = 0x40;
    pub const TX_DS: u8 = 0x20;
    pub const MAX_RT: u8 = 0x10;

    pub const OBSERVE_TX: u8 = 0x08;
    pub const ARC_CNT_MASK: u8 = 0x0F;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const TX_ADDR: u8 = 0x10;

    pub const FIFO_STATUS: u8 = 0x17;
    pub const RX_EMPTY: u8 = 0x01;
    pub const TX_FULL: u8 = 0x20;

    pub const DYNPD: u8 = 0x1C;
    pub const FEATURE: u8 = 0x1D;
    pub const EN_DPL: u8 = 0x04;
    pub const EN_ACK_PAY: u8 = 0x02;
}

const CONFIG_BASE: u8 = reg::EN_CRC | reg::CRCO;
const CLEAR_IRQ_FLAGS: u8 = reg::RX_DR | reg::TX_DS | reg::MAX_RT;
const PIPE_0: u8 = 0x01;

/// Transmit power steps of the transceiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum OutputPower {
    /// -18 dBm.
    Minus18Dbm,
    /// -12 dBm.
    Minus12Dbm,
    /// -6 dBm.
    Minus6Dbm,
    /// 0 dBm.
    #[default]
    ZeroDbm,
}

impl OutputPower {
    /// `RF_PWR` bits of `RF_SETUP`.
    pub fn bits(self) -> u8 {
        match self {
            Self::Minus18Dbm => 0x00,
            Self::Minus12Dbm => 0x02,
            Self::Minus6Dbm => 0x04,
            Self::ZeroDbm => 0x06,
        }
    }

    /// Parses persisted `RF_PWR` bits. Anything unknown means 0 dBm.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0x00 => Self::Minus18Dbm,
            0x02 => Self::Minus12Dbm,
            0x04 => Self::Minus6Dbm,
            _ => Self::ZeroDbm,
        }
    }

    /// Power in dBm.
    pub fn dbm(self) -> i8 {
        match self {
            Self::Minus18Dbm => -18,
            Self::Minus12Dbm => -12,
            Self::Minus6Dbm => -6,
            Self::ZeroDbm => 0,
        }
    }

    /// One step louder, saturating at 0 dBm.
    pub fn step_up(self) -> Self {
        match self {
            Self::Minus18Dbm => Self::Minus12Dbm,
            Self::Minus12Dbm => Self::Minus6Dbm,
            Self::Minus6Dbm | Self::ZeroDbm => Self::ZeroDbm,
        }
    }

    /// One step quieter, saturating at -18 dBm.
    pub fn step_down(self) -> Self {
        match self {
            Self::ZeroDbm => Self::Minus6Dbm,
            Self::Minus6Dbm => Self::Minus12Dbm,
            Self::Minus12Dbm | Self::Minus18Dbm => Self::Minus18Dbm,
        }
    }

    /// The next step, wrapping from 0 dBm back to -18 dBm.
    pub fn cycle(self) -> Self {
        match self {
            Self::ZeroDbm => Self::Minus18Dbm,
            other => other.step_up(),
        }
    }
}

/// Static radio configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RadioConfig {
    /// RF channel, 2400 MHz + `channel` MHz.
    pub channel: u8,
    /// Address of the dongle, least significant byte first.
    pub address: [u8; 5],
    /// Initial output power.
    pub output_power: OutputPower,
}

impl RadioConfig {
    /// Highest channel the transceiver can tune to.
    pub const MAX_CHANNEL: u8 = 125;

    /// Checks that the transceiver can use this configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.channel > Self::MAX_CHANNEL {
            return Err("channel must be at most 125");
        }
        let first = self.address[0];
        if self.address.iter().all(|&b| b == first) {
            return Err("address must not consist of a single repeated byte");
        }
        Ok(())
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: RF_CHANNEL,
            address: DONGLE_ADDRESS,
            output_power: OutputPower::ZeroDbm,
        }
    }
}

/// Driver for one nRF24L01+ transceiver.
///
/// ## Type Parameters
///
/// - `SPI`: an [`embedded_hal::spi::SpiDevice`] owning chip select
/// - `CE`: an [`embedded_hal::digital::OutputPin`] driving chip enable
/// - `IRQ`: an [`embedded_hal::digital::InputPin`] on the active-low interrupt line
#[derive(Debug)]
pub struct Nrf24<SPI, CE, IRQ> {
    spi: SPI,
    ce: CE,
    irq: IRQ,
    config: RadioConfig,
    stats: RadioStats,
    in_flight: bool,
}

impl<SPI, CE, IRQ> Nrf24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin,
{
    /// Wraps the peripherals. Nothing is written until [`init`](Self::init).
    pub fn new(spi: SPI, ce: CE, irq: IRQ, config: RadioConfig) -> Self {
        Self {
            spi,
            ce,
            irq,
            config,
            stats: RadioStats::default(),
            in_flight: false,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Returns the peripherals.
    pub fn release(self) -> (SPI, CE, IRQ) {
        (self.spi, self.ce, self.irq)
    }

    /// Writes the shared configuration and leaves the radio powered down with empty FIFOs.
    pub fn init(&mut self) -> Result<(), Error> {
        self.set_ce(false)?;
        self.write_register(reg::CONFIG, CONFIG_BASE)?;
        self.write_register(reg::SETUP_AW, reg::AW_5_BYTES)?;
        let address = self.config.address;
        self.write_register_bytes(reg::TX_ADDR, &address)?;
        self.write_register_bytes(reg::RX_ADDR_P0, &address)?;
        self.write_register(reg::EN_AA, PIPE_0)?;
        self.write_register(reg::EN_RXADDR, PIPE_0)?;
        self.write_register(reg::SETUP_RETR, setup_retr())?;
        self.write_register(reg::FEATURE, reg::EN_DPL | reg::EN_ACK_PAY)?;
        self.write_register(reg::DYNPD, PIPE_0)?;
        self.write_register(reg::RF_CH, self.config.channel)?;
        self.write_register(reg::RF_SETUP, self.rf_setup())?;
        let _ = self.command(cmd::FLUSH_RX)?;
        let _ = self.command(cmd::FLUSH_TX)?;
        self.write_register(reg::STATUS, CLEAR_IRQ_FLAGS)?;
        info!(
            "radio ready on channel {} at {} dBm",
            self.config.channel,
            self.config.output_power.dbm()
        );
        Ok(())
    }

    /// Powers up in receive role and starts listening. Dongle only.
    pub fn start_listening(&mut self) -> Result<(), Error> {
        self.write_register(reg::CONFIG, CONFIG_BASE | reg::PWR_UP | reg::PRIM_RX)?;
        self.write_register(reg::STATUS, CLEAR_IRQ_FLAGS)?;
        self.set_ce(true)
    }

    fn rf_setup(&self) -> u8 {
        reg::RF_DR_2MBPS | self.config.output_power.bits()
    }

    fn set_ce(&mut self, high: bool) -> Result<(), Error> {
        let result = if high {
            self.ce.set_high()
        } else {
            self.ce.set_low()
        };
        result.map_err(|_| Error::Pin)
    }

    /// Clocks out `command` followed by `data` and returns STATUS.
    fn command_with(&mut self, command: u8, data: &[u8]) -> Result<u8, Error> {
        let mut buf = [0u8; MAX_PAYLOAD_LEN + 1];
        let len = data.len() + 1;
        buf[0] = command;
        buf[1..len].copy_from_slice(data);
        self.spi
            .transfer_in_place(&mut buf[..len])
            .map_err(|_| Error::Bus)?;
        Ok(buf[0])
    }

    fn command(&mut self, command: u8) -> Result<u8, Error> {
        self.command_with(command, &[])
    }

    /// Clocks out `command` and reads `out.len()` bytes back.
    fn read_with(&mut self, command: u8, out: &mut [u8]) -> Result<(), Error> {
        let mut buf = [cmd::NOP; MAX_PAYLOAD_LEN + 1];
        let len = out.len() + 1;
        buf[0] = command;
        self.spi
            .transfer_in_place(&mut buf[..len])
            .map_err(|_| Error::Bus)?;
        out.copy_from_slice(&buf[1..len]);
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut value = [0u8];
        self.read_with(cmd::R_REGISTER | register, &mut value)?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        self.write_register_bytes(register, &[value])
    }

    fn write_register_bytes(&mut self, register: u8, value: &[u8]) -> Result<(), Error> {
        let _ = self.command_with(cmd::W_REGISTER | register, value)?;
        Ok(())
    }

    /// Ends the transaction, accounts for it and powers the radio down.
    fn finish_send(&mut self) -> Result<SendOutcome, Error> {
        self.set_ce(false)?;
        self.in_flight = false;
        let status = self.command(cmd::NOP)?;
        let retransmits = self.read_register(reg::OBSERVE_TX)? & reg::ARC_CNT_MASK;
        let outcome = if status & reg::TX_DS != 0 {
            SendOutcome::Acked
        } else {
            SendOutcome::NotAcked
        };
        self.stats.record(retransmits, outcome);
        self.power_down()?;
        trace!("send finished: status {}, {} retransmits", status, retransmits);
        Ok(outcome)
    }

    /// Empties the TX FIFO, clears the flags and powers the radio down.
    fn power_down(&mut self) -> Result<(), Error> {
        let _ = self.command(cmd::FLUSH_TX)?;
        self.write_register(reg::STATUS, CLEAR_IRQ_FLAGS)?;
        self.write_register(reg::CONFIG, CONFIG_BASE)
    }

    /// Powers up, loads `payload` and raises CE.
    fn fire(&mut self, payload: &[u8]) -> Result<(), Error> {
        let rf_setup = self.rf_setup();
        self.write_register(reg::RF_SETUP, rf_setup)?;
        self.write_register(reg::CONFIG, CONFIG_BASE | reg::PWR_UP)?;
        self.write_register(reg::STATUS, CLEAR_IRQ_FLAGS)?;
        let _ = self.command_with(cmd::W_TX_PAYLOAD, payload)?;
        self.set_ce(true)
    }

    /// Pops the head of the RX FIFO. Oversized or empty payloads flush the FIFO.
    fn read_rx_payload(&mut self) -> Result<Option<Frame>, Error> {
        if self.read_register(reg::FIFO_STATUS)? & reg::RX_EMPTY != 0 {
            return Ok(None);
        }
        let mut width = [0u8];
        self.read_with(cmd::R_RX_PL_WID, &mut width)?;
        let width = usize::from(width[0]);
        if width == 0 || width > MAX_PAYLOAD_LEN {
            warn!("dropping rx fifo, bad payload width {}", width);
            let _ = self.command(cmd::FLUSH_RX)?;
            return Ok(None);
        }
        let mut frame = Frame::new();
        // width was checked against the frame capacity above
        let _ = frame.resize(width, 0);
        self.read_with(cmd::R_RX_PAYLOAD, &mut frame)?;
        self.write_register(reg::STATUS, reg::RX_DR)?;
        Ok(Some(frame))
    }
}

impl<SPI, CE, IRQ> Link for Nrf24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin,
{
    fn start_send(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        if let Err(e) = self.fire(payload) {
            warn!("send setup failed, powering down");
            // the setup error is the one worth reporting
            let _ = self.set_ce(false);
            let _ = self.power_down();
            return Err(e);
        }
        self.in_flight = true;
        Ok(())
    }

    fn poll_send(&mut self) -> nb::Result<SendOutcome, Error> {
        if !self.in_flight {
            debug!("poll without a transaction in flight");
            return Ok(SendOutcome::NotAcked);
        }
        if !self.irq.is_low().map_err(|_| Error::Pin)? {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.finish_send()?)
    }

    fn abort_send(&mut self) -> Result<SendOutcome, Error> {
        if !self.in_flight {
            return Ok(SendOutcome::NotAcked);
        }
        self.finish_send()
    }

    fn read_ack_payload(&mut self) -> Result<Option<Frame>, Error> {
        self.read_rx_payload()
    }

    fn stats(&self) -> RadioStats {
        self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = RadioStats::default();
    }

    fn output_power(&self) -> OutputPower {
        self.config.output_power
    }

    fn set_output_power(&mut self, power: OutputPower) {
        self.config.output_power = power;
    }
}

impl<SPI, CE, IRQ> Listener for Nrf24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin,
{
    fn recv(&mut self) -> Result<Option<Frame>, Error> {
        self.read_rx_payload()
    }

    fn queue_ack_payload(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        if self.read_register(reg::FIFO_STATUS)? & reg::TX_FULL != 0 {
            debug!("ack fifo full, flushing");
            self.flush_ack_payloads()?;
        }
        let _ = self.command_with(cmd::W_ACK_PAYLOAD, payload)?;
        Ok(())
    }

    fn flush_ack_payloads(&mut self) -> Result<(), Error> {
        let _ = self.command(cmd::FLUSH_TX)?;
        Ok(())
    }
}

/// `SETUP_RETR` value: delay code in the high nibble, count in the low nibble.
fn setup_retr() -> u8 {
    let delay_code = (AUTO_RETRANSMIT_DELAY_US / 250).saturating_sub(1) as u8;
    (delay_code << 4) | (AUTO_RETRANSMIT_COUNT & 0x0F)
}
