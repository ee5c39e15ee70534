use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    interface IStreamAmm {
        function getSwapQuote(address tokenIn, address tokenOut, uint256 amountIn) external view returns (uint256 amountOut, uint256 fee);
    }
}

sol! {
    #[derive(Debug)]
    event LiquidityAdded(address indexed provider, uint256 tokenAmount, uint256 baseAmount);

    #[derive(Debug)]
    event TokenSwapped(address indexed trader, address tokenIn, address tokenOut, uint256 amountIn, uint256 amountOut);
}
