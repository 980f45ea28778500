//! Financial performance metrics.

/// Computed performance metrics for a return series.
///
/// All return-based metrics assume simple (not log) returns.
/// Annualization uses the `periods_per_year` parameter
/// (e.g., 252 for daily, 12 for monthly, 52 for weekly).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerformanceMetrics {
    /// Total cumulative return (e.g., 0.15 = 15%)
    pub total_return: f64,
    /// Annualised return: `(1 + total_return)^(periods_per_year / n) - 1`
    pub annualised_return: f64,
    /// Annualized volatility (standard deviation of returns)
    pub annualised_volatility: f64,
    /// Annualized Sharpe ratio: (mean return - risk_free) / volatility
    pub sharpe: f64,
    /// Annualized Sortino ratio: (mean return - risk_free) / downside_deviation
    pub sortino: f64,
    /// Maximum drawdown, as a non-positive fraction (e.g., -0.20 = 20% peak-to-trough)
    pub max_drawdown: f64,
    /// Calmar ratio: annualised_return / |max_drawdown|. `NaN` when there was
    /// no drawdown (division by zero would be meaningless, not infinite).
    pub calmar: f64,
    /// Number of return periods
    pub num_periods: usize,
    /// Periods with positive return
    pub winning_periods: usize,
    /// Periods with negative return
    pub losing_periods: usize,
    /// Empirical expected shortfall at 95%: the mean of the worst 5% of raw
    /// returns by count, not a parametric normal-distribution estimate and
    /// not clamped to losses.
    pub expected_shortfall_95: f64,
    /// Win rate: fraction of positive-return periods
    pub win_rate: f64,
    /// Profit factor: sum(positive returns) / |sum(negative returns)|
    pub profit_factor: f64,
    /// Mean return across winning periods
    pub avg_win: f64,
    /// Mean return across losing periods (non-positive)
    pub avg_loss: f64,
    /// Payoff ratio: mean(winning returns) / |mean(losing returns)|
    pub payoff_ratio: f64,
    /// Kelly criterion: win_rate - (1 - win_rate) / payoff_ratio
    pub kelly: f64,
    /// Average fraction of portfolio value turned over per rebalance
    pub turnover: f64,
    /// Total transaction costs incurred over the backtest, in currency units
    pub total_costs: f64,
    /// Number of rebalances executed (excludes skipped/cancelled attempts)
    pub rebalance_count: usize,
}

impl std::fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Performance Metrics")?;
        writeln!(f, "  Total return:    {:>8.2}%", self.total_return * 100.0)?;
        writeln!(f, "  Ann. return:     {:>8.2}%", self.annualised_return * 100.0)?;
        writeln!(f, "  Ann. volatility: {:>8.2}%", self.annualised_volatility * 100.0)?;
        writeln!(f, "  Sharpe:          {:>8.2}", self.sharpe)?;
        writeln!(f, "  Sortino:         {:>8.2}", self.sortino)?;
        writeln!(f, "  Max drawdown:    {:>8.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "  Calmar:          {:>8.2}", self.calmar)?;
        writeln!(
            f,
            "  Win/Loss/Total:  {}/{}/{}",
            self.winning_periods, self.losing_periods, self.num_periods
        )?;
        writeln!(f, "  ES (95%):        {:>8.2}%", self.expected_shortfall_95 * 100.0)?;
        writeln!(f, "  Win rate:        {:>8.2}%", self.win_rate * 100.0)?;
        writeln!(f, "  Profit factor:   {:>8.2}", self.profit_factor)?;
        writeln!(f, "  Avg win/loss:    {:>8.2}% / {:>8.2}%", self.avg_win * 100.0, self.avg_loss * 100.0)?;
        writeln!(f, "  Payoff ratio:    {:>8.2}", self.payoff_ratio)?;
        writeln!(f, "  Kelly:           {:>8.2}%", self.kelly * 100.0)?;
        writeln!(f, "  Turnover:        {:>8.2}%", self.turnover * 100.0)?;
        writeln!(f, "  Total costs:     {:>8.2}", self.total_costs)?;
        write!(f, "  Rebalances:      {:>8}", self.rebalance_count)
    }
}

/// Compute performance metrics from an equity curve.
///
/// # Arguments
///
/// * `equity_curve` — Portfolio value at the end of each period, in currency
///   units (e.g., `[1000.0, 1010.0, 1004.9]`). Day-over-day simple returns are
///   derived from consecutive entries.
/// * `periods_per_year` — Annualization factor (252 for daily, 12 for monthly)
/// * `risk_free` — Annualised risk-free rate (e.g., 0.04 for 4%), converted
///   internally to a per-period rate
///
/// Returns `None` if `equity_curve` has fewer than 2 entries (no return can
/// be derived). Turnover/cost/rebalance-count fields are zeroed; use
/// [`compute_metrics_with_activity`] when that bookkeeping is available
/// (e.g. from a finished backtest's event log).
pub fn compute_metrics(equity_curve: &[f64], periods_per_year: f64, risk_free: f64) -> Option<PerformanceMetrics> {
    compute_metrics_with_activity(equity_curve, periods_per_year, risk_free, 0.0, 0.0, 0)
}

/// As [`compute_metrics`], but also records trading-activity bookkeeping
/// (`turnover`, `total_costs`, `rebalance_count`) pulled from the event log of
/// a finished backtest rather than derivable from the equity curve alone.
pub fn compute_metrics_with_activity(
    equity_curve: &[f64],
    periods_per_year: f64,
    risk_free: f64,
    turnover: f64,
    total_costs: f64,
    rebalance_count: usize,
) -> Option<PerformanceMetrics> {
    if equity_curve.len() < 2 {
        return None;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();
    let n = returns.len();
    let risk_free_per_period = risk_free / periods_per_year;

    // Total return: taken directly from the curve's endpoints, exact even
    // where compounding per-period returns would accumulate rounding error.
    let first = equity_curve[0];
    let last = equity_curve[equity_curve.len() - 1];
    let total_return = if first != 0.0 { last / first - 1.0 } else { 0.0 };

    // Annualised return: (1 + total_return)^(periods_per_year / n) - 1
    let years = n as f64 / periods_per_year;
    let annualised_return = if years > 0.0 && total_return > -1.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else if total_return <= -1.0 {
        -1.0 // total or leveraged loss — clamp to -100%
    } else {
        0.0
    };

    // Mean return
    let mean = returns.iter().sum::<f64>() / n as f64;

    // Volatility (sample std dev, annualized)
    let variance = if n > 1 {
        returns.iter().map(|&r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let annualised_volatility = variance.sqrt() * periods_per_year.sqrt();

    // Excess returns for Sharpe/Sortino
    let excess_mean = mean - risk_free_per_period;

    // Sharpe ratio (annualized)
    let sharpe = if annualised_volatility > 0.0 {
        excess_mean * periods_per_year.sqrt() / (variance.sqrt())
    } else {
        0.0
    };

    // Downside deviation (only negative excess returns)
    let downside_variance = if n > 1 {
        returns
            .iter()
            .map(|&r| {
                let excess = r - risk_free_per_period;
                if excess < 0.0 { excess.powi(2) } else { 0.0 }
            })
            .sum::<f64>()
            / (n - 1) as f64
    } else {
        0.0
    };
    let downside_dev = downside_variance.sqrt();

    // Sortino ratio (annualized)
    let sortino = if downside_dev > 0.0 {
        excess_mean * periods_per_year.sqrt() / downside_dev
    } else {
        0.0
    };

    // Max drawdown, stored as a non-positive fraction
    let max_drawdown = -compute_max_drawdown(&returns);

    // Calmar ratio: undefined (NaN), not zero, when there was no drawdown to
    // divide by — a zero-drawdown run isn't a calmar of zero.
    let calmar = if max_drawdown < 0.0 {
        annualised_return / max_drawdown.abs()
    } else {
        f64::NAN
    };

    // Win/loss counts
    let winning_periods = returns.iter().filter(|&&r| r > 0.0).count();
    let losing_periods = returns.iter().filter(|&&r| r < 0.0).count();

    // Expected shortfall (95%): empirical mean of the worst 5% of raw
    // returns by count, not clamped to losses the way the optimizers'
    // internal tail-risk weighting is.
    let expected_shortfall_95 = empirical_tail_mean(&returns, 0.95);

    // Win rate
    let win_rate = winning_periods as f64 / n as f64;

    // Profit factor: sum(positive) / |sum(negative)|
    let sum_positive: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let sum_negative: f64 = returns.iter().filter(|&&r| r < 0.0).sum();
    let profit_factor = if sum_negative != 0.0 {
        sum_positive / sum_negative.abs()
    } else if sum_positive > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    // Payoff ratio: mean(winning) / |mean(losing)|
    let mean_winning = if winning_periods > 0 {
        sum_positive / winning_periods as f64
    } else {
        0.0
    };
    let mean_losing = if losing_periods > 0 {
        sum_negative / losing_periods as f64
    } else {
        0.0
    };
    let payoff_ratio = if mean_losing != 0.0 {
        mean_winning / mean_losing.abs()
    } else if mean_winning > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    // Kelly criterion: w - (1 - w) / b
    let kelly = if payoff_ratio > 0.0 && payoff_ratio.is_finite() {
        win_rate - (1.0 - win_rate) / payoff_ratio
    } else {
        0.0
    };

    Some(PerformanceMetrics {
        total_return,
        annualised_return,
        annualised_volatility,
        sharpe,
        sortino,
        max_drawdown,
        calmar,
        num_periods: n,
        winning_periods,
        losing_periods,
        expected_shortfall_95,
        win_rate,
        profit_factor,
        avg_win: mean_winning,
        avg_loss: mean_losing,
        payoff_ratio,
        kelly,
        turnover,
        total_costs,
        rebalance_count,
    })
}

/// Empirical expected-shortfall helper: mean of the worst `k` raw returns by
/// count, where `k = ceil((1 - alpha) * n)` clamped to `[1, n]`. Returns are
/// not clamped to zero first — if every return in the tail happens to be
/// positive, the result reflects that.
fn empirical_tail_mean(returns: &[f64], alpha: f64) -> f64 {
    let n = returns.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let k = ((1.0 - alpha) * n as f64).ceil() as usize;
    let k = k.clamp(1, n);
    sorted[..k].iter().sum::<f64>() / k as f64
}

/// Compute maximum drawdown from a return series.
fn compute_max_drawdown(returns: &[f64]) -> f64 {
    let mut peak = 1.0_f64;
    let mut equity = 1.0_f64;
    let mut max_dd = 0.0_f64;

    for &r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        let dd = (peak - equity) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    max_dd
}

/// Rolling Sharpe ratio over a sliding window.
///
/// Returns NaN for positions where the window is incomplete.
///
/// # Arguments
///
/// * `returns` — Return series.
/// * `window` — Window size (e.g., 63 for quarterly).
/// * `periods_per_year` — Annualization factor (e.g., 252).
pub fn rolling_sharpe(returns: &[f64], window: usize, periods_per_year: usize) -> Vec<f64> {
    let n = returns.len();
    let mut out = vec![f64::NAN; n];
    if n < window || window < 2 {
        return out;
    }

    let ppy = periods_per_year as f64;
    let k = window as f64;

    // Seed first window
    let mut sum: f64 = returns[..window].iter().sum();
    let mut sum_sq: f64 = returns[..window].iter().map(|r| r * r).sum();

    let mean = sum / k;
    let var = (sum_sq - sum * sum / k) / (k - 1.0);
    let std = var.max(0.0).sqrt();
    out[window - 1] = if std > 0.0 { mean * ppy.sqrt() / std } else { 0.0 };

    // Slide window
    for i in window..n {
        let old = returns[i - window];
        let new = returns[i];
        sum += new - old;
        sum_sq += new * new - old * old;

        let mean = sum / k;
        let var = (sum_sq - sum * sum / k) / (k - 1.0);
        let std = var.max(0.0).sqrt();
        out[i] = if std > 0.0 { mean * ppy.sqrt() / std } else { 0.0 };
    }

    out
}

/// Rolling annualized volatility over a sliding window.
///
/// Returns NaN for positions where the window is incomplete.
///
/// # Arguments
///
/// * `returns` — Return series.
/// * `window` — Window size (e.g., 63 for quarterly).
/// * `periods_per_year` — Annualization factor (e.g., 252).
pub fn rolling_volatility(returns: &[f64], window: usize, periods_per_year: usize) -> Vec<f64> {
    let n = returns.len();
    let mut out = vec![f64::NAN; n];
    if n < window || window < 2 {
        return out;
    }

    let ppy = periods_per_year as f64;
    let k = window as f64;

    // Seed first window
    let mut sum: f64 = returns[..window].iter().sum();
    let mut sum_sq: f64 = returns[..window].iter().map(|r| r * r).sum();

    let var = (sum_sq - sum * sum / k) / (k - 1.0);
    out[window - 1] = var.max(0.0).sqrt() * ppy.sqrt();

    // Slide window
    for i in window..n {
        let old = returns[i - window];
        let new = returns[i];
        sum += new - old;
        sum_sq += new * new - old * old;

        let var = (sum_sq - sum * sum / k) / (k - 1.0);
        out[i] = var.max(0.0).sqrt() * ppy.sqrt();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an equity curve from a starting value and a series of simple
    /// per-period returns.
    fn curve_from_returns(start: f64, returns: &[f64]) -> Vec<f64> {
        let mut curve = Vec::with_capacity(returns.len() + 1);
        curve.push(start);
        let mut equity = start;
        for &r in returns {
            equity *= 1.0 + r;
            curve.push(equity);
        }
        curve
    }

    #[test]
    fn empty_curve() {
        assert!(compute_metrics(&[], 252.0, 0.0).is_none());
    }

    #[test]
    fn single_point_curve_has_no_metrics() {
        assert!(compute_metrics(&[1000.0], 252.0, 0.0).is_none());
    }

    #[test]
    fn single_period_return() {
        let curve = curve_from_returns(1000.0, &[0.05]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.total_return - 0.05).abs() < 1e-10);
        assert_eq!(m.num_periods, 1);
        assert_eq!(m.winning_periods, 1);
        assert_eq!(m.losing_periods, 0);
        assert_eq!(m.rebalance_count, 0);
    }

    #[test]
    fn annualised_return_matches_total_return_over_exactly_one_year() {
        // 12 months of 1% return
        let curve = curve_from_returns(1.0, &[0.01; 12]);
        let m = compute_metrics(&curve, 12.0, 0.0).unwrap();

        // Total return: (1.01)^12 - 1 ≈ 12.68%
        assert!((m.total_return - 0.12682503).abs() < 1e-4);
        // Annualised return equals total return over exactly one year.
        assert!((m.annualised_return - m.total_return).abs() < 1e-6);

        assert_eq!(m.winning_periods, 12);
        assert_eq!(m.losing_periods, 0);
    }

    #[test]
    fn max_drawdown_simple() {
        // Up 10%, down 20%, up 5%
        let curve = curve_from_returns(1.0, &[0.10, -0.20, 0.05]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();

        // Equity: 1.0 -> 1.1 -> 0.88 -> 0.924
        // Peak at 1.1, trough at 0.88, dd = (1.1 - 0.88) / 1.1 = 0.2, stored negative.
        assert!((m.max_drawdown - (-0.2)).abs() < 1e-10);
    }

    #[test]
    fn no_drawdown_when_always_up() {
        let curve = curve_from_returns(1.0, &[0.01, 0.02, 0.03]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.max_drawdown).abs() < 1e-10);
        assert!(m.calmar.is_nan(), "zero drawdown calmar is undefined, not zero");
    }

    #[test]
    fn sharpe_positive_for_positive_returns() {
        let curve = curve_from_returns(1.0, &[0.01, 0.02, 0.015, 0.005, 0.01]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!(m.sharpe > 0.0);
    }

    #[test]
    fn sortino_ge_sharpe_with_few_down_periods() {
        // Mostly positive returns → downside dev < total vol → Sortino > Sharpe
        let curve = curve_from_returns(1.0, &[0.02, 0.03, 0.01, -0.005, 0.015]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!(m.sortino >= m.sharpe);
    }

    #[test]
    fn win_loss_count() {
        let curve = curve_from_returns(1.0, &[0.01, -0.02, 0.0, 0.03, -0.01]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert_eq!(m.winning_periods, 2);
        assert_eq!(m.losing_periods, 2);
        assert_eq!(m.num_periods, 5);
    }

    #[test]
    fn calmar_ratio() {
        let curve = curve_from_returns(1.0, &[0.01, -0.05, 0.02, 0.03, 0.01]);
        let m = compute_metrics(&curve, 12.0, 0.0).unwrap();
        if m.max_drawdown < 0.0 {
            assert!((m.calmar - m.annualised_return / m.max_drawdown.abs()).abs() < 1e-10);
        }
    }

    #[test]
    fn risk_free_rate_is_annualised_and_converted_per_period() {
        // A flat 0% return series with a positive annual risk-free rate
        // should show up as a negative excess return, hence a negative Sharpe.
        let curve = curve_from_returns(1.0, &[0.0; 10]);
        let m = compute_metrics(&curve, 252.0, 0.05).unwrap();
        assert!(m.sharpe < 0.0);
    }

    #[test]
    fn display_format() {
        let curve = curve_from_returns(1.0, &[0.01, -0.005, 0.02]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        let s = format!("{m}");
        assert!(s.contains("Total return:"));
        assert!(s.contains("Sharpe:"));
        assert!(s.contains("Max drawdown:"));
        assert!(s.contains("ES (95%)"));
        assert!(s.contains("Win rate:"));
        assert!(s.contains("Avg win/loss:"));
        assert!(s.contains("Kelly:"));
        assert!(s.contains("Turnover:"));
    }

    #[test]
    fn win_rate_all_positive() {
        let curve = curve_from_returns(1.0, &[0.01, 0.02, 0.03]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.win_rate - 1.0).abs() < 1e-10);
    }

    #[test]
    fn win_rate_half() {
        let curve = curve_from_returns(1.0, &[0.01, -0.01, 0.01, -0.01]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.win_rate - 0.5).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_positive() {
        let curve = curve_from_returns(1.0, &[0.02, -0.01, 0.03, -0.005]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!(m.profit_factor > 1.0);
        assert!((m.profit_factor - 0.05 / 0.015).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_all_positive() {
        let curve = curve_from_returns(1.0, &[0.01, 0.02, 0.03]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!(m.profit_factor.is_infinite());
    }

    #[test]
    fn avg_win_and_avg_loss() {
        let curve = curve_from_returns(1.0, &[0.02, -0.01, 0.04, -0.02]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.avg_win - 0.03).abs() < 1e-10);
        assert!((m.avg_loss - (-0.015)).abs() < 1e-10);
    }

    #[test]
    fn payoff_ratio() {
        let curve = curve_from_returns(1.0, &[0.02, -0.01, 0.04, -0.02]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.payoff_ratio - 2.0).abs() < 1e-10);
    }

    #[test]
    fn kelly_criterion() {
        let curve = curve_from_returns(1.0, &[0.02, -0.01, 0.04, -0.02]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.kelly - 0.25).abs() < 1e-10);
    }

    #[test]
    fn expected_shortfall_negative_tail() {
        // Returns with known negative tail
        let mut returns: Vec<f64> = vec![0.01; 95];
        returns.extend(vec![-0.10; 5]); // 5% worst = -10%
        let curve = curve_from_returns(1.0, &returns);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!(m.expected_shortfall_95 < 0.0, "ES should be negative");
        // Exact empirical mean of the worst 5 of 100 returns
        assert!((m.expected_shortfall_95 - (-0.10)).abs() < 1e-9);
    }

    #[test]
    fn expected_shortfall_reflects_gains_when_tail_has_none() {
        // Every return is positive — the "worst" 5% tail is still positive,
        // unlike a clamped-to-losses CVaR which would report zero.
        let curve = curve_from_returns(1.0, &[0.05; 20]);
        let m = compute_metrics(&curve, 252.0, 0.0).unwrap();
        assert!((m.expected_shortfall_95 - 0.05).abs() < 1e-10);
    }

    #[test]
    fn activity_bookkeeping_is_passed_through() {
        let curve = curve_from_returns(1.0, &[0.01, -0.01, 0.02]);
        let m = compute_metrics_with_activity(&curve, 252.0, 0.0, 0.35, 12.5, 4).unwrap();
        assert_eq!(m.turnover, 0.35);
        assert_eq!(m.total_costs, 12.5);
        assert_eq!(m.rebalance_count, 4);
    }

    #[test]
    fn rolling_sharpe_basic() {
        let returns = vec![0.01; 100];
        let result = rolling_sharpe(&returns, 20, 252);
        assert_eq!(result.len(), 100);
        for v in result.iter().take(19) {
            assert!(v.is_nan());
        }
        assert!(!result[19].is_nan());
    }

    #[test]
    fn rolling_volatility_basic() {
        let returns = vec![
            0.01, -0.01, 0.01, -0.01, 0.01, -0.01, 0.01, -0.01, 0.01, -0.01,
        ];
        let result = rolling_volatility(&returns, 5, 252);
        assert_eq!(result.len(), 10);
        assert!(result[3].is_nan());
        assert!(!result[4].is_nan());
        assert!(result[4] > 0.0);
    }
}
